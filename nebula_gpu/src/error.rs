//! Error types for the Nebula GPU core
//!
//! One error enum covers the whole layer: driver bootstrap, buffer
//! lifecycle, capability gating, and synchronization failures.
//! Every operation either returns a valid handle/result or one of
//! these — nothing is swallowed internally.

use std::fmt;

/// Result type for Nebula GPU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Nebula GPU errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Instance/device/queue/pool creation failed; the layer refuses to
    /// operate until re-initialized
    InitializationFailed(String),

    /// Operation referenced an unknown buffer id (caller error)
    InvalidHandle(u64),

    /// Mapping was requested on a buffer without host-visible memory
    NotHostVisible(u64),

    /// The active device/driver does not expose the requested feature.
    /// Never degrades silently to a different code path.
    UnsupportedCapability(&'static str),

    /// Memory-type lookup failed or the driver reported out-of-memory
    OutOfMemory,

    /// A byte range fell outside the target buffer
    OutOfBounds { offset: u64, len: u64, size: u64 },

    /// A fence wait exceeded its timeout; treated as an unrecoverable
    /// device condition (typically a lost device or driver hang)
    SyncTimeout(&'static str),

    /// Backend-specific error (Vulkan, mock, etc.)
    BackendError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidHandle(id) => write!(f, "Invalid buffer handle: {}", id),
            Error::NotHostVisible(id) => {
                write!(f, "Buffer {} is not host-visible and cannot be mapped", id)
            }
            Error::UnsupportedCapability(what) => {
                write!(f, "Unsupported device capability: {}", what)
            }
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::OutOfBounds { offset, len, size } => write!(
                f,
                "Byte range {}..{} out of bounds for buffer of {} bytes",
                offset,
                offset + len,
                size
            ),
            Error::SyncTimeout(what) => write!(f, "Synchronization timeout: {}", what),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
