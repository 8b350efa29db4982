//! Fence pool - recycled synchronization fences
//!
//! Fence creation is cheap but not free, and transfer-heavy frames can
//! burn through dozens per frame. The pool hands out reset fences and
//! takes signaled ones back instead of creating and destroying them per
//! submit. An acquired fence is owned exclusively by its acquirer until
//! released.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::driver::{GpuDriver, RawFence};
use crate::error::Result;
use crate::gpu_warn;
use crate::stats::TransferStats;

const SOURCE: &str = "nebula::fence_pool";

/// Recycling pool of driver fences
pub struct FencePool {
    driver: Arc<dyn GpuDriver>,
    stats: Arc<TransferStats>,
    free: Mutex<Vec<RawFence>>,
    /// Fences acquired and not yet released
    outstanding: AtomicUsize,
}

impl FencePool {
    pub fn new(driver: Arc<dyn GpuDriver>, stats: Arc<TransferStats>) -> Self {
        Self {
            driver,
            stats,
            free: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Acquire an unsignaled fence, recycling a pooled one when possible
    pub fn acquire(&self) -> Result<RawFence> {
        let recycled = self.free.lock().pop();
        let fence = match recycled {
            Some(fence) => {
                // Pooled fences come back signaled from their last use
                self.driver.reset_fence(fence)?;
                fence
            }
            None => {
                let fence = self.driver.create_fence(false)?;
                self.stats.fence_created();
                fence
            }
        };
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        Ok(fence)
    }

    /// Return a fence to the pool after its wait completed
    pub fn release(&self, fence: RawFence) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        self.free.lock().push(fence);
    }

    /// Block until the fence signals, counting the wait
    pub fn wait(&self, fence: RawFence, timeout_ns: u64) -> Result<()> {
        self.stats.fence_waited();
        self.driver.wait_for_fence(fence, timeout_ns)
    }

    /// Fences currently acquired and unreleased (test introspection)
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }
}

impl Drop for FencePool {
    fn drop(&mut self) {
        let outstanding = self.outstanding.load(Ordering::Relaxed);
        if outstanding != 0 {
            gpu_warn!(
                SOURCE,
                "Dropping fence pool with {} fence(s) still outstanding",
                outstanding
            );
        }
        for fence in self.free.lock().drain(..) {
            self.driver.destroy_fence(fence);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "fence_pool_tests.rs"]
mod tests;
