/*!
# Nebula GPU

Explicit GPU buffer lifecycle and synchronization core.

This crate manages buffers on an explicit graphics API without owning
the rendering pipeline: memory-type selection, a concurrent buffer
registry, a triple-buffered staging ring for device-local uploads,
pooled fences and per-thread command pools, frame-in-flight pacing with
deferred deletion, fine-grained (synchronization2-style) barriers, and
redundant-state suppression for dynamic pipeline state.

Backends implement the [`driver::GpuDriver`] trait; the ash-based
Vulkan backend lives in the `nebula_gpu_driver_vulkan` crate, and a
mock driver in this crate backs the GPU-free test suite.

## Architecture

- **GpuContext**: explicit top-level object owning every subsystem
- **GpuDriver**: the narrow driver surface backends implement
- **BufferRegistry**: concurrent id-to-buffer table
- **StagingRing**: fence-gated host-visible upload slots
- **FrameScheduler**: frames in flight plus deferred deletion
- **BarrierBuilder / DynamicStateTracker**: recording-side helpers
*/

// Internal modules
mod config;
mod context;
pub mod error;
pub mod buffer;
pub mod driver;
pub mod frame;
pub mod log;
pub mod memory;
pub mod state;
pub mod stats;
pub mod sync;
pub mod transfer;

// Main nebula namespace module
pub mod nebula {
    // Error types
    pub use crate::error::{Error, Result};

    // Context and its configuration
    pub use crate::config::GpuConfig;
    pub use crate::context::GpuContext;

    // Driver surface for backend implementations
    pub use crate::driver::GpuDriver;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger, reset_logger, set_logger};
        // Note: gpu_* macros are NOT re-exported here - they are internal only
    }

    // Driver types sub-module
    pub mod driver {
        pub use crate::driver::*;
    }

    // Buffer sub-module
    pub mod buffer {
        pub use crate::buffer::*;
    }

    // Transfer sub-module
    pub mod transfer {
        pub use crate::transfer::*;
    }

    // Synchronization sub-module
    pub mod sync {
        pub use crate::sync::*;
    }

    // Dynamic-state sub-module
    pub mod state {
        pub use crate::state::*;
    }

    // Stats sub-module
    pub mod stats {
        pub use crate::stats::*;
    }
}

// Flat re-exports for backend crates and applications
pub use config::GpuConfig;
pub use context::GpuContext;
pub use error::{Error, Result};
