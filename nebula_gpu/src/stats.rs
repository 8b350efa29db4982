//! Transfer and lifecycle counters
//!
//! Read-only snapshot accessors plus a reset operation, intended for
//! periodic logging/telemetry, not for control flow. Owned by the
//! context (one instance per device context, no process-wide statics).

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated by the buffer/transfer components
#[derive(Debug, Default)]
pub struct TransferStats {
    buffers_created: AtomicU64,
    buffers_destroyed: AtomicU64,
    bytes_allocated: AtomicU64,
    bytes_freed: AtomicU64,
    bytes_transferred: AtomicU64,
    staged_uploads: AtomicU64,
    direct_uploads: AtomicU64,
    command_buffers_recorded: AtomicU64,
    fences_created: AtomicU64,
    fence_waits: AtomicU64,
}

/// Plain snapshot of all counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub buffers_created: u64,
    pub buffers_destroyed: u64,
    pub bytes_allocated: u64,
    pub bytes_freed: u64,
    pub bytes_transferred: u64,
    pub staged_uploads: u64,
    pub direct_uploads: u64,
    pub command_buffers_recorded: u64,
    pub fences_created: u64,
    pub fence_waits: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn buffer_created(&self, bytes: u64) {
        self.buffers_created.fetch_add(1, Ordering::Relaxed);
        self.bytes_allocated.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn buffer_destroyed(&self, bytes: u64) {
        self.buffers_destroyed.fetch_add(1, Ordering::Relaxed);
        self.bytes_freed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn staged_upload(&self, bytes: u64) {
        self.staged_uploads.fetch_add(1, Ordering::Relaxed);
        self.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn direct_upload(&self, bytes: u64) {
        self.direct_uploads.fetch_add(1, Ordering::Relaxed);
        self.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn command_buffer_recorded(&self) {
        self.command_buffers_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fence_created(&self) {
        self.fences_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fence_waited(&self) {
        self.fence_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            buffers_created: self.buffers_created.load(Ordering::Relaxed),
            buffers_destroyed: self.buffers_destroyed.load(Ordering::Relaxed),
            bytes_allocated: self.bytes_allocated.load(Ordering::Relaxed),
            bytes_freed: self.bytes_freed.load(Ordering::Relaxed),
            bytes_transferred: self.bytes_transferred.load(Ordering::Relaxed),
            staged_uploads: self.staged_uploads.load(Ordering::Relaxed),
            direct_uploads: self.direct_uploads.load(Ordering::Relaxed),
            command_buffers_recorded: self.command_buffers_recorded.load(Ordering::Relaxed),
            fences_created: self.fences_created.load(Ordering::Relaxed),
            fence_waits: self.fence_waits.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.buffers_created.store(0, Ordering::Relaxed);
        self.buffers_destroyed.store(0, Ordering::Relaxed);
        self.bytes_allocated.store(0, Ordering::Relaxed);
        self.bytes_freed.store(0, Ordering::Relaxed);
        self.bytes_transferred.store(0, Ordering::Relaxed);
        self.staged_uploads.store(0, Ordering::Relaxed);
        self.direct_uploads.store(0, Ordering::Relaxed);
        self.command_buffers_recorded.store(0, Ordering::Relaxed);
        self.fences_created.store(0, Ordering::Relaxed);
        self.fence_waits.store(0, Ordering::Relaxed);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
