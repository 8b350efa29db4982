//! ManagedBuffer - one GPU buffer plus its bound allocation
//!
//! Value object owned exclusively by the BufferRegistry. Holds the raw
//! driver handles, usage metadata, the optional persistent mapping, and
//! the write-tracking fields updated by uploads.

use crate::driver::{BufferUsageFlags, MemoryPropertyFlags, RawBuffer, RawFence, RawMemory};

/// Opaque buffer identifier handed to callers
///
/// Monotonically increasing, never reused while the underlying GPU
/// object is registered. `BufferId::NULL` is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl BufferId {
    /// Null id sentinel
    pub const NULL: BufferId = BufferId(0);

    /// Whether this is the null id
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Persistent host mapping of a buffer's memory
///
/// Valid for the buffer's entire lifetime; released exactly once when
/// the buffer is destroyed.
#[derive(Debug)]
pub struct PersistentMapping {
    pub ptr: *mut u8,
    pub len: u64,
}

/// One GPU buffer with its bound memory allocation and metadata
#[derive(Debug)]
pub struct ManagedBuffer {
    /// Driver buffer handle
    pub(crate) buffer: RawBuffer,
    /// Driver memory allocation bound to the buffer
    pub(crate) memory: RawMemory,
    /// Caller-requested size in bytes
    pub(crate) size: u64,
    /// Driver-reported allocation size (>= `size`)
    pub(crate) alloc_size: u64,
    /// Usage flags the buffer was created with
    pub(crate) usage: BufferUsageFlags,
    /// Memory properties of the backing allocation
    pub(crate) properties: MemoryPropertyFlags,
    /// Resolved from `properties` at creation
    pub(crate) is_device_local: bool,
    pub(crate) is_host_visible: bool,
    /// Persistent mapping, if the buffer was created with one
    pub(crate) mapping: Option<PersistentMapping>,
    /// Whether a transient `map_buffer` mapping is currently live
    pub(crate) transient_mapped: bool,
    /// End of the most recent upload, in bytes
    pub(crate) write_cursor: u64,
    /// Fence of the most recent GPU-side write (staged upload / resize
    /// copy), if any. Handle only - ownership stays with the submitter.
    pub(crate) last_write_fence: Option<RawFence>,
    /// Frame index of the most recent write
    pub(crate) last_write_frame: u64,
}

// The raw mapping pointer is only ever dereferenced while holding the
// registry entry for this buffer, which serializes access.
unsafe impl Send for ManagedBuffer {}
unsafe impl Sync for ManagedBuffer {}

/// Metadata snapshot used by the upload dispatcher
#[derive(Debug, Clone, Copy)]
pub struct BufferInfo {
    pub raw: RawBuffer,
    pub size: u64,
    pub usage: BufferUsageFlags,
    pub properties: MemoryPropertyFlags,
    pub is_device_local: bool,
    pub is_host_visible: bool,
}
