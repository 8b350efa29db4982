//! Frame scheduler - frames in flight and deferred deletion
//!
//! Tracks a monotonically increasing frame index over N reusable frame
//! slots. begin_frame waits the slot fence of the frame that used this
//! slot N frames ago, sweeps deletions that have aged out, then resets
//! the fence for reuse; end_frame submits a fence-only batch so the GPU
//! signals the slot when everything recorded for the frame completes.
//!
//! Deletion is deferred, never immediate: a buffer scheduled for
//! deletion at frame F is destroyed by the first begin_frame whose
//! index is at least F + N, by which point the slot wait has proven the
//! GPU finished every frame that could still reference it. Frame aging
//! only vouches for the graphics queue; staged uploads and resize
//! copies run on the transfer queue, so each pending deletion also
//! carries the buffer's last-write fence and holds until it signals.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::{BufferId, BufferRegistry};
use crate::driver::{GpuDriver, QueueKind, RawFence};
use crate::error::Result;
use crate::{gpu_bail, gpu_trace};

const SOURCE: &str = "nebula::frame";

struct PendingDeletion {
    id: BufferId,
    /// Frame index current when the deletion was scheduled
    scheduled_frame: u64,
    /// Fence of the buffer's last GPU-side write, captured at scheduling
    /// time. Destruction holds until it signals.
    gating_fence: Option<RawFence>,
}

struct SchedulerState {
    /// One fence per frame slot, created signaled so the first N
    /// begin_frames never block
    slot_fences: Vec<RawFence>,
    frame_index: u64,
    in_frame: bool,
    /// Oldest first; scheduled_frame is nondecreasing
    deletions: VecDeque<PendingDeletion>,
}

/// Frame-in-flight pacing and deferred buffer deletion
pub struct FrameScheduler {
    driver: Arc<dyn GpuDriver>,
    registry: Arc<BufferRegistry>,
    frames_in_flight: u64,
    state: Mutex<SchedulerState>,
}

impl FrameScheduler {
    pub fn new(
        driver: Arc<dyn GpuDriver>,
        registry: Arc<BufferRegistry>,
        frames_in_flight: u32,
    ) -> Result<Self> {
        let frames_in_flight = frames_in_flight.max(1) as u64;
        let mut slot_fences = Vec::with_capacity(frames_in_flight as usize);
        for _ in 0..frames_in_flight {
            slot_fences.push(driver.create_fence(true)?);
        }
        Ok(Self {
            driver,
            registry,
            frames_in_flight,
            state: Mutex::new(SchedulerState {
                slot_fences,
                frame_index: 0,
                in_frame: false,
                deletions: VecDeque::new(),
            }),
        })
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> u64 {
        self.frames_in_flight
    }

    /// Current frame index (frames completed via end_frame)
    pub fn frame_index(&self) -> u64 {
        self.state.lock().frame_index
    }

    /// Buffers scheduled but not yet destroyed
    pub fn pending_deletions(&self) -> usize {
        self.state.lock().deletions.len()
    }

    /// Begin a frame: wait the slot's previous use, sweep aged-out
    /// deletions, reset the slot fence. Returns the frame index.
    pub fn begin_frame(&self) -> Result<u64> {
        let mut state = self.state.lock();
        if state.in_frame {
            gpu_bail!(SOURCE, "begin_frame called while a frame is already open");
        }
        let frame = state.frame_index;
        let slot = (frame % self.frames_in_flight) as usize;
        let fence = state.slot_fences[slot];

        // Frame pacing waits unbounded; a timeout here would turn a
        // long frame into a fatal error.
        self.driver.wait_for_fence(fence, u64::MAX)?;

        // Sweep before resetting the fence: destruction must happen
        // while the wait still vouches for the slot's previous frame
        while let Some(front) = state.deletions.front() {
            if frame < front.scheduled_frame + self.frames_in_flight {
                break;
            }
            // The slot wait covers the graphics queue only; a transfer-
            // queue write still in flight keeps the buffer alive. The
            // queue is FIFO, so the front entry holds the rest back.
            if let Some(gate) = front.gating_fence {
                if !self.driver.fence_status(gate).unwrap_or(true) {
                    break;
                }
            }
            let pending = state.deletions.pop_front().expect("front checked");
            gpu_trace!(
                SOURCE,
                "Deferred-destroying buffer {} (scheduled frame {}, now {})",
                pending.id.0,
                pending.scheduled_frame,
                frame
            );
            self.registry.destroy(pending.id);
        }

        self.driver.reset_fence(fence)?;
        state.in_frame = true;
        Ok(frame)
    }

    /// End the open frame: submit a fence-only batch so the slot fence
    /// signals when the frame's GPU work completes, and advance the
    /// frame index.
    pub fn end_frame(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.in_frame {
            gpu_bail!(SOURCE, "end_frame called with no open frame");
        }
        let slot = (state.frame_index % self.frames_in_flight) as usize;
        let fence = state.slot_fences[slot];
        self.driver.submit(QueueKind::Graphics, &[], fence)?;
        state.in_frame = false;
        state.frame_index += 1;
        Ok(())
    }

    /// Schedule a buffer for destruction once every frame that could
    /// reference it has completed and its last GPU-side write retired
    pub fn schedule_delete(&self, id: BufferId) {
        let gating_fence = self.registry.gpu_write_fence(id).ok().flatten();
        let mut state = self.state.lock();
        let scheduled_frame = state.frame_index;
        state.deletions.push_back(PendingDeletion {
            id,
            scheduled_frame,
            gating_fence,
        });
    }

    /// Destroy every pending deletion immediately.
    ///
    /// Only valid after the GPU has been made idle (context teardown).
    pub fn drain_deletions(&self) {
        let mut state = self.state.lock();
        for pending in state.deletions.drain(..) {
            self.registry.destroy(pending.id);
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        let state = self.state.lock();
        for fence in &state.slot_fences {
            self.driver.destroy_fence(*fence);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
