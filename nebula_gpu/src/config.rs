//! Configuration for a GPU context

/// GPU context configuration
///
/// Sizing knobs for the frame scheduler, staging ring and fence waits.
/// The defaults match the reference sizing: 2 frames in flight, a
/// triple-buffered staging ring with 8 MiB slots, and a one second fence
/// timeout so a driver hang surfaces as an error instead of an infinite
/// wait.
#[derive(Debug, Clone)]
pub struct GpuConfig {
    /// Number of frames in flight
    pub frames_in_flight: usize,

    /// Number of staging ring slots
    pub staging_slots: usize,

    /// Size of each staging slot in bytes
    pub staging_slot_size: u64,

    /// Timeout for fence waits, in nanoseconds. Frame fences wait
    /// unbounded; everything else uses this.
    pub fence_timeout_ns: u64,

    /// Alignment applied to uniform/storage buffer sizes
    pub uniform_alignment: u64,

    /// Enable validation layers in drivers that support them
    pub enable_validation: bool,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            staging_slots: 3,
            staging_slot_size: 8 * 1024 * 1024,
            fence_timeout_ns: 1_000_000_000,
            uniform_alignment: 256,
            enable_validation: cfg!(debug_assertions),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
