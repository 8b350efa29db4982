//! Per-thread command pools and command-buffer recycling
//!
//! Native command pools require external synchronization, so each
//! recording thread gets its own pool, created lazily on first acquire
//! and keyed by ThreadId. Command buffers recycle through their origin
//! pool: a buffer acquired on thread A and retired on thread B is reset
//! under A's pool entry lock, which is the synchronization the driver
//! contract requires.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::driver::{GpuDriver, QueueKind, RawCommandBuffer, RawCommandPool};
use crate::error::{Error, Result};
use crate::gpu_trace;

const SOURCE: &str = "nebula::command_pool";

struct ThreadPool {
    pool: RawCommandPool,
    /// Reset buffers ready to record
    available: Vec<RawCommandBuffer>,
    /// Buffers handed out and not yet recycled
    pending: Vec<RawCommandBuffer>,
}

/// Lazily grown map of per-thread command pools for one queue class
pub struct CommandBufferPools {
    driver: Arc<dyn GpuDriver>,
    queue: QueueKind,
    pools: DashMap<ThreadId, ThreadPool, FxBuildHasher>,
}

impl CommandBufferPools {
    pub fn new(driver: Arc<dyn GpuDriver>, queue: QueueKind) -> Self {
        Self {
            driver,
            queue,
            pools: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Acquire a recordable command buffer from the calling thread's pool.
    ///
    /// Returns the buffer and the owning thread's id; the id must be
    /// passed back to [`recycle`](Self::recycle) when the buffer's
    /// submission has completed.
    pub fn acquire(&self) -> Result<(RawCommandBuffer, ThreadId)> {
        let tid = thread::current().id();
        if !self.pools.contains_key(&tid) {
            let pool = self.driver.create_command_pool(self.queue)?;
            gpu_trace!(SOURCE, "Created {:?} command pool for {:?}", self.queue, tid);
            self.pools.insert(
                tid,
                ThreadPool {
                    pool,
                    available: Vec::new(),
                    pending: Vec::new(),
                },
            );
        }

        let mut entry = self
            .pools
            .get_mut(&tid)
            .ok_or(Error::InitializationFailed(
                "Command pool vanished during acquire".to_string(),
            ))?;
        let cmd = match entry.available.pop() {
            Some(cmd) => cmd,
            None => self.driver.allocate_command_buffer(entry.pool)?,
        };
        entry.pending.push(cmd);
        Ok((cmd, tid))
    }

    /// Reset a retired command buffer and return it to its origin pool.
    ///
    /// Safe to call from any thread: the reset happens while holding the
    /// origin pool's entry lock.
    pub fn recycle(&self, origin: ThreadId, cmd: RawCommandBuffer) -> Result<()> {
        let mut entry = self
            .pools
            .get_mut(&origin)
            .ok_or(Error::InvalidHandle(cmd.0))?;
        self.driver.reset_command_buffer(cmd)?;
        entry.pending.retain(|c| *c != cmd);
        entry.available.push(cmd);
        Ok(())
    }

    /// Command buffers handed out and not yet recycled, across all pools
    pub fn pending_count(&self) -> usize {
        self.pools.iter().map(|e| e.pending.len()).sum()
    }

    /// Number of per-thread pools created so far
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}

impl Drop for CommandBufferPools {
    fn drop(&mut self) {
        // Destroying a pool frees all buffers allocated from it
        for entry in self.pools.iter() {
            self.driver.destroy_command_pool(entry.pool);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "command_pool_tests.rs"]
mod tests;
