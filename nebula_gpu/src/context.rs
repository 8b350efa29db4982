//! GpuContext - explicit top-level context
//!
//! Owns the driver and every subsystem built on it: registry, staging
//! ring, fence pool, per-thread command pools, frame scheduler and
//! stats. All state is instance state; creating two contexts on two
//! devices is supported. Teardown waits for the GPU, drains deferred
//! deletions, then releases the subsystems in dependency order.

use std::sync::Arc;

use crate::buffer::{BufferId, BufferRegistry};
use crate::config::GpuConfig;
use crate::driver::{
    BufferUsageFlags, CommandBufferUsage, DriverCaps, GpuDriver, MemoryPropertyFlags, QueueKind,
};
use crate::error::{Error, Result};
use crate::frame::FrameScheduler;
use crate::state::DynamicStateTracker;
use crate::stats::{StatsSnapshot, TransferStats};
use crate::sync::BarrierBuilder;
use crate::transfer::{CommandBufferPools, FencePool, StagingRing};
use crate::{gpu_debug, gpu_error, gpu_info};

const SOURCE: &str = "nebula::context";

/// Explicit GPU buffer/transfer context over one device
pub struct GpuContext {
    config: GpuConfig,
    stats: Arc<TransferStats>,
    frames: FrameScheduler,
    staging: StagingRing,
    pools: Arc<CommandBufferPools>,
    fences: Arc<FencePool>,
    registry: Arc<BufferRegistry>,
    driver: Arc<dyn GpuDriver>,
}

impl GpuContext {
    /// Build a context over a driver with the given configuration
    pub fn new(driver: Arc<dyn GpuDriver>, config: GpuConfig) -> Result<Self> {
        if config.frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        let caps = driver.capabilities();
        let stats = Arc::new(TransferStats::new());
        let registry = Arc::new(BufferRegistry::new(driver.clone(), stats.clone()));
        let fences = Arc::new(FencePool::new(driver.clone(), stats.clone()));
        let pools = Arc::new(CommandBufferPools::new(driver.clone(), QueueKind::Transfer));
        let staging = StagingRing::new(
            driver.clone(),
            registry.clone(),
            fences.clone(),
            pools.clone(),
            stats.clone(),
            config.staging_slots as u32,
            config.staging_slot_size,
            config.fence_timeout_ns,
        )?;
        let frames = FrameScheduler::new(
            driver.clone(),
            registry.clone(),
            config.frames_in_flight as u32,
        )?;
        gpu_info!(
            SOURCE,
            "Context ready: {} frames in flight, {} staging slots, sync2={}, eds={}, rebar={}",
            config.frames_in_flight,
            config.staging_slots,
            caps.sync2,
            caps.extended_dynamic_state,
            registry.memory_types().has_resizable_bar()
        );
        Ok(Self {
            config,
            stats,
            frames,
            staging,
            pools,
            fences,
            registry,
            driver,
        })
    }

    /// Capability set of the underlying driver
    pub fn capabilities(&self) -> DriverCaps {
        self.driver.capabilities()
    }

    /// A barrier builder bound to this device's capabilities
    pub fn barrier_builder(&self) -> BarrierBuilder {
        BarrierBuilder::new(self.driver.capabilities())
    }

    /// A fresh dynamic-state tracker for one recording thread
    pub fn state_tracker(&self) -> DynamicStateTracker {
        DynamicStateTracker::new(self.driver.capabilities())
    }

    // ===== BUFFER CREATION =====

    /// Create a buffer with explicit usage and memory properties.
    ///
    /// Host-visible buffers are persistently mapped for their lifetime.
    pub fn create_buffer(
        &self,
        size: u64,
        usage: BufferUsageFlags,
        properties: MemoryPropertyFlags,
    ) -> Result<BufferId> {
        let persistent = properties.contains(MemoryPropertyFlags::HOST_VISIBLE);
        self.registry.create(size, usage, properties, persistent)
    }

    /// Device-local vertex buffer
    pub fn create_vertex_buffer(&self, size: u64) -> Result<BufferId> {
        self.create_buffer(
            size,
            BufferUsageFlags::VERTEX,
            MemoryPropertyFlags::DEVICE_LOCAL,
        )
    }

    /// Device-local index buffer
    pub fn create_index_buffer(&self, size: u64) -> Result<BufferId> {
        self.create_buffer(
            size,
            BufferUsageFlags::INDEX,
            MemoryPropertyFlags::DEVICE_LOCAL,
        )
    }

    /// Host-visible, persistently mapped uniform buffer. Size is rounded
    /// up to the configured uniform alignment.
    pub fn create_dynamic_uniform_buffer(&self, size: u64) -> Result<BufferId> {
        self.create_buffer(
            self.align_up(size),
            BufferUsageFlags::UNIFORM,
            MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Device-local storage buffer, size rounded up like uniforms
    pub fn create_storage_buffer(&self, size: u64) -> Result<BufferId> {
        self.create_buffer(
            self.align_up(size),
            BufferUsageFlags::STORAGE,
            MemoryPropertyFlags::DEVICE_LOCAL,
        )
    }

    fn align_up(&self, size: u64) -> u64 {
        size.next_multiple_of(self.config.uniform_alignment.max(1))
    }

    // ===== DATA MOVEMENT =====

    /// Upload bytes into a buffer at an offset.
    ///
    /// Host-visible destinations take the direct path (memcpy through
    /// the mapping); device-local destinations go through the staging
    /// ring on the transfer queue.
    pub fn upload_data(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let info = self.registry.info(id)?;
        if info.is_host_visible {
            self.registry.write_host(id, offset, data)
        } else {
            self.staging
                .upload(id, &info, offset, data, self.frames.frame_index())
                .map(|_| ())
        }
    }

    /// Read bytes out of a buffer at an offset.
    ///
    /// Host-visible sources are read through the mapping after waiting
    /// out any pending GPU write; device-local sources are staged back
    /// synchronously through the ring.
    pub fn read_buffer(&self, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>> {
        let info = self.registry.info(id)?;
        let mut out = vec![0u8; len as usize];
        if info.is_host_visible {
            if let Some(fence) = self.registry.gpu_write_fence(id)? {
                if !self.driver.fence_status(fence).unwrap_or(true) {
                    self.driver
                        .wait_for_fence(fence, self.config.fence_timeout_ns)?;
                }
            }
            self.registry.read_host(id, offset, &mut out)?;
        } else {
            self.staging.download(&info, offset, &mut out)?;
        }
        Ok(out)
    }

    /// Map a range of a host-visible buffer
    pub fn map_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<*mut u8> {
        self.registry.map(id, offset, size)
    }

    /// Release a transient mapping
    pub fn unmap_buffer(&self, id: BufferId) -> Result<()> {
        self.registry.unmap(id)
    }

    // ===== LIFECYCLE =====

    /// Grow or shrink a buffer, preserving `min(old, new)` bytes.
    ///
    /// Allocates a new buffer with the old usage and properties, copies
    /// the surviving prefix on the transfer queue, waits the copy, and
    /// schedules the old id for deferred deletion. Returns the new id.
    pub fn resize_buffer(&self, id: BufferId, new_size: u64) -> Result<BufferId> {
        let old = self.registry.info(id)?;
        let new_id = self
            .registry
            .create(new_size, old.usage, old.properties, old.is_host_visible)?;
        let new = self.registry.info(new_id)?;

        let copy_size = old.size.min(new_size);
        if copy_size > 0 {
            if let Err(e) = self.copy_sync(old.raw, new.raw, copy_size) {
                self.registry.destroy(new_id);
                return Err(e);
            }
        }

        self.frames.schedule_delete(id);
        gpu_debug!(
            SOURCE,
            "Resized buffer {} -> {} ({} -> {} bytes)",
            id.0,
            new_id.0,
            old.size,
            new_size
        );
        Ok(new_id)
    }

    /// Record, submit and wait a raw buffer-to-buffer copy
    fn copy_sync(
        &self,
        src: crate::driver::RawBuffer,
        dst: crate::driver::RawBuffer,
        size: u64,
    ) -> Result<()> {
        let (cmd, origin) = self.pools.acquire()?;
        let record = (|| -> Result<()> {
            self.driver
                .begin_command_buffer(cmd, CommandBufferUsage::OneTimeSubmit)?;
            self.driver.cmd_copy_buffer(cmd, src, 0, dst, 0, size);
            self.driver.end_command_buffer(cmd)
        })();
        if let Err(e) = record {
            let _ = self.pools.recycle(origin, cmd);
            return Err(e);
        }
        self.stats.command_buffer_recorded();

        let fence = self.fences.acquire()?;
        if let Err(e) = self.driver.submit(QueueKind::Transfer, &[cmd], fence) {
            let _ = self.pools.recycle(origin, cmd);
            self.fences.release(fence);
            return Err(e);
        }
        let wait = self.fences.wait(fence, self.config.fence_timeout_ns);
        self.pools.recycle(origin, cmd)?;
        self.fences.release(fence);
        wait
    }

    /// Schedule a buffer for deletion after the in-flight frames retire.
    ///
    /// Idempotent: unknown ids are a no-op.
    pub fn delete_buffer(&self, id: BufferId) {
        if self.registry.contains(id) {
            self.frames.schedule_delete(id);
        }
    }

    /// Declared size of a buffer
    pub fn buffer_size(&self, id: BufferId) -> Result<u64> {
        Ok(self.registry.info(id)?.size)
    }

    /// Live buffer count (staging slots included)
    pub fn buffer_count(&self) -> usize {
        self.registry.len()
    }

    // ===== FRAME PACING =====

    /// Begin the next frame; blocks until its slot's previous use
    /// completed and sweeps aged-out deletions. Returns the frame index.
    pub fn begin_frame(&self) -> Result<u64> {
        self.frames.begin_frame()
    }

    /// End the open frame
    pub fn end_frame(&self) -> Result<()> {
        self.frames.end_frame()
    }

    /// Current frame index
    pub fn frame_index(&self) -> u64 {
        self.frames.frame_index()
    }

    // ===== OBSERVABILITY =====

    /// Snapshot of the transfer/lifecycle counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Zero all counters
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Flush staging and wait for the device to go idle
    pub fn wait_idle(&self) -> Result<()> {
        self.staging.flush()?;
        self.driver.wait_idle()
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        if self.staging.flush().is_err() {
            gpu_error!(SOURCE, "Staging flush failed during context teardown");
        }
        if self.driver.wait_idle().is_err() {
            gpu_error!(SOURCE, "wait_idle failed during context teardown");
        }
        self.frames.drain_deletions();
        gpu_info!(SOURCE, "Context shut down");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
