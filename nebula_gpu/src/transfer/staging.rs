//! Staging ring - host-visible slots feeding device-local buffers
//!
//! A fixed ring of persistently mapped host-visible buffers. Each staged
//! upload copies the caller's bytes into the current slot at a bump
//! offset, records copy + release barrier into a per-thread command
//! buffer, and submits on the transfer queue with a pooled fence. The
//! ring never blocks while a slot has room; it blocks only when it wraps
//! back onto a slot whose submissions are still in flight, and the fence
//! wait at that point is what makes overwriting the slot safe.
//!
//! All ring state sits behind one mutex: uploads serialize, which is the
//! price of bump allocation. Recording and submission happen inside the
//! lock so slot regions are never reordered against their fences.

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::ThreadId;

use crate::buffer::{BufferId, BufferInfo, BufferRegistry};
use crate::driver::{
    BufferUsageFlags, CommandBufferUsage, GpuDriver, MemoryPropertyFlags, QueueKind, RawBuffer,
    RawCommandBuffer, RawFence,
};
use crate::error::{Error, Result};
use crate::stats::TransferStats;
use crate::sync::{BarrierBuilder, BarrierKind};
use crate::{gpu_debug, gpu_error, gpu_trace};

const SOURCE: &str = "nebula::staging";

/// Copy offsets are bumped to this alignment between uploads
const SLOT_ALIGN: u64 = 4;

/// One submission whose copy reads from a slot region
struct InFlight {
    fence: RawFence,
    cmd: RawCommandBuffer,
    origin: ThreadId,
}

struct Slot {
    id: BufferId,
    raw: RawBuffer,
    /// Persistent mapping of the whole slot
    ptr: *mut u8,
    /// Bump offset of the next free byte
    offset: u64,
    /// Submissions still reading from this slot, oldest first
    in_flight: Vec<InFlight>,
}

// Slot pointers are only touched under the ring mutex.
unsafe impl Send for Slot {}

struct RingState {
    slots: Vec<Slot>,
    current: usize,
}

/// Ring of staging slots with per-upload submit
pub struct StagingRing {
    driver: Arc<dyn GpuDriver>,
    registry: Arc<BufferRegistry>,
    fences: Arc<super::FencePool>,
    pools: Arc<super::CommandBufferPools>,
    stats: Arc<TransferStats>,
    barriers: BarrierBuilder,
    slot_size: u64,
    fence_timeout_ns: u64,
    state: Mutex<RingState>,
}

impl StagingRing {
    /// Create `slot_count` persistently mapped host-visible slots
    pub fn new(
        driver: Arc<dyn GpuDriver>,
        registry: Arc<BufferRegistry>,
        fences: Arc<super::FencePool>,
        pools: Arc<super::CommandBufferPools>,
        stats: Arc<TransferStats>,
        slot_count: u32,
        slot_size: u64,
        fence_timeout_ns: u64,
    ) -> Result<Self> {
        if slot_count == 0 || slot_size == 0 {
            return Err(Error::InitializationFailed(
                "Staging ring needs at least one slot of nonzero size".to_string(),
            ));
        }
        let barriers = BarrierBuilder::new(driver.capabilities());
        let mut slots = Vec::with_capacity(slot_count as usize);
        for _ in 0..slot_count {
            let id = registry.create(
                slot_size,
                BufferUsageFlags::TRANSFER_SRC | BufferUsageFlags::TRANSFER_DST,
                MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
                true,
            )?;
            let raw = registry.info(id)?.raw;
            let ptr = registry.map(id, 0, slot_size)?;
            slots.push(Slot {
                id,
                raw,
                ptr,
                offset: 0,
                in_flight: Vec::new(),
            });
        }
        gpu_debug!(
            SOURCE,
            "Staging ring ready: {} slot(s) x {} bytes",
            slot_count,
            slot_size
        );
        Ok(Self {
            driver,
            registry,
            fences,
            pools,
            stats,
            barriers,
            slot_size,
            fence_timeout_ns,
            state: Mutex::new(RingState { slots, current: 0 }),
        })
    }

    /// Post-copy release barrier for the destination's usage class
    fn barrier_kind(usage: BufferUsageFlags) -> BarrierKind {
        if usage.contains(BufferUsageFlags::INDEX) {
            BarrierKind::TransferToIndex
        } else if usage.contains(BufferUsageFlags::VERTEX) {
            BarrierKind::TransferToVertexAttribute
        } else {
            BarrierKind::TransferToShaderRead
        }
    }

    /// Wait out and retire every submission reading from a slot
    fn drain_slot(&self, slot: &mut Slot) -> Result<()> {
        // Queue fences signal in submission order, so the last one
        // covers the rest. All of them still need recycling.
        if let Some(last) = slot.in_flight.last() {
            self.fences.wait(last.fence, self.fence_timeout_ns)?;
        }
        for in_flight in slot.in_flight.drain(..) {
            self.pools.recycle(in_flight.origin, in_flight.cmd)?;
            self.fences.release(in_flight.fence);
        }
        Ok(())
    }

    /// Stage `data` into `dst` at `dst_offset` via the current slot.
    ///
    /// Returns the fence of the submitted copy; the destination is safe
    /// to read on the GPU after the recorded barrier, and on the CPU
    /// after the fence signals.
    pub fn upload(
        &self,
        dst_id: BufferId,
        dst: &BufferInfo,
        dst_offset: u64,
        data: &[u8],
        frame: u64,
    ) -> Result<RawFence> {
        let len = data.len() as u64;
        if len > self.slot_size {
            gpu_error!(
                SOURCE,
                "Upload of {} bytes exceeds staging slot size {}",
                len,
                self.slot_size
            );
            return Err(Error::OutOfMemory);
        }
        if dst_offset.checked_add(len).is_none_or(|end| end > dst.size) {
            return Err(Error::OutOfBounds {
                offset: dst_offset,
                len,
                size: dst.size,
            });
        }
        if len == 0 {
            return Err(Error::OutOfBounds {
                offset: dst_offset,
                len: 0,
                size: dst.size,
            });
        }

        let mut state = self.state.lock();
        let state = &mut *state;

        // Advance on overflow; an upload never splits across slots
        if state.slots[state.current].offset + len > self.slot_size {
            state.current = (state.current + 1) % state.slots.len();
            let next = &mut state.slots[state.current];
            self.drain_slot(next)?;
            next.offset = 0;
            gpu_trace!(SOURCE, "Advanced to staging slot {}", state.current);
        }

        let slot = &mut state.slots[state.current];
        let src_offset = slot.offset;
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                slot.ptr.add(src_offset as usize),
                data.len(),
            );
        }

        let (cmd, origin) = self.pools.acquire()?;
        let record = (|| -> Result<()> {
            self.driver
                .begin_command_buffer(cmd, CommandBufferUsage::OneTimeSubmit)?;
            self.driver
                .cmd_copy_buffer(cmd, slot.raw, src_offset, dst.raw, dst_offset, len);
            let dep = self.barriers.buffer_barrier(
                Self::barrier_kind(dst.usage),
                dst.raw,
                dst_offset,
                len,
            )?;
            self.driver.cmd_pipeline_barrier(cmd, &dep)?;
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

        slot.in_flight.push(InFlight { fence, cmd, origin });
        slot.offset = (src_offset + len).next_multiple_of(SLOT_ALIGN);
        self.stats.staged_upload(len);
        self.registry
            .note_gpu_write(dst_id, dst_offset + len, fence, frame)?;
        Ok(fence)
    }

    /// Read `out.len()` bytes from a device-local buffer through a slot.
    ///
    /// Synchronous: takes over the next slot, copies device-to-slot on
    /// the transfer queue, waits the fence, then copies out of the
    /// mapping. The slot is left drained and empty.
    pub fn download(&self, src: &BufferInfo, src_offset: u64, out: &mut [u8]) -> Result<()> {
        let len = out.len() as u64;
        if len > self.slot_size {
            return Err(Error::OutOfMemory);
        }
        if src_offset.checked_add(len).is_none_or(|end| end > src.size) {
            return Err(Error::OutOfBounds {
                offset: src_offset,
                len,
                size: src.size,
            });
        }
        if len == 0 {
            return Ok(());
        }

        let mut state = self.state.lock();
        let state = &mut *state;
        state.current = (state.current + 1) % state.slots.len();
        let slot = &mut state.slots[state.current];
        self.drain_slot(slot)?;
        slot.offset = 0;

        let (cmd, origin) = self.pools.acquire()?;
        let record = (|| -> Result<()> {
            self.driver
                .begin_command_buffer(cmd, CommandBufferUsage::OneTimeSubmit)?;
            self.driver
                .cmd_copy_buffer(cmd, src.raw, src_offset, slot.raw, 0, len);
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

        let wait = self.fences.wait(fence, self.fence_timeout_ns);
        self.pools.recycle(origin, cmd)?;
        self.fences.release(fence);
        wait?;

        unsafe {
            std::ptr::copy_nonoverlapping(slot.ptr, out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    /// Wait out every in-flight submission and retire its resources
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        for slot in &mut state.slots {
            self.drain_slot(slot)?;
            slot.offset = 0;
        }
        Ok(())
    }
}

impl Drop for StagingRing {
    fn drop(&mut self) {
        if self.flush().is_err() {
            gpu_error!(SOURCE, "Staging flush failed during teardown");
        }
        let state = self.state.lock();
        for slot in &state.slots {
            self.registry.destroy(slot.id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "staging_tests.rs"]
mod tests;
