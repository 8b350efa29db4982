//! Plain data types crossing the driver boundary
//!
//! Handles are opaque `u64` newtypes so the core never depends on a
//! concrete graphics API. Flag values match the Vulkan encoding, which
//! lets the Vulkan driver translate them with a plain `from_raw` instead
//! of a lookup table; any other backend is free to remap them.

use bitflags::bitflags;

// ===== RAW HANDLES =====

macro_rules! raw_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u64);

        impl $name {
            /// Null handle sentinel
            pub const NULL: $name = $name(0);

            /// Whether this is the null handle
            pub fn is_null(&self) -> bool {
                self.0 == 0
            }
        }
    };
}

raw_handle!(
    /// Driver-side buffer object
    RawBuffer
);
raw_handle!(
    /// Driver-side memory allocation
    RawMemory
);
raw_handle!(
    /// Driver-side fence
    RawFence
);
raw_handle!(
    /// Driver-side command pool
    RawCommandPool
);
raw_handle!(
    /// Driver-side command buffer
    RawCommandBuffer
);

// ===== FLAGS =====

bitflags! {
    /// Buffer usage flags (Vulkan-compatible bit values)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsageFlags: u32 {
        const TRANSFER_SRC = 0x0000_0001;
        const TRANSFER_DST = 0x0000_0002;
        const UNIFORM      = 0x0000_0010;
        const STORAGE      = 0x0000_0020;
        const INDEX        = 0x0000_0040;
        const VERTEX       = 0x0000_0080;
    }
}

bitflags! {
    /// Memory property flags (Vulkan-compatible bit values)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryPropertyFlags: u32 {
        const DEVICE_LOCAL  = 0x0000_0001;
        const HOST_VISIBLE  = 0x0000_0002;
        const HOST_COHERENT = 0x0000_0004;
        const HOST_CACHED   = 0x0000_0008;
    }
}

bitflags! {
    /// Fine-grained pipeline stage mask, 64-bit (synchronization2-style)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageFlags: u64 {
        const NONE                   = 0;
        const TOP_OF_PIPE            = 0x0000_0001;
        const VERTEX_INPUT           = 0x0000_0004;
        const VERTEX_SHADER          = 0x0000_0008;
        const FRAGMENT_SHADER        = 0x0000_0080;
        const COMPUTE_SHADER         = 0x0000_0800;
        const ALL_TRANSFER           = 0x0000_1000;
        const BOTTOM_OF_PIPE         = 0x0000_2000;
        const ALL_COMMANDS           = 0x0001_0000;
        const COPY                   = 0x1_0000_0000;
        const INDEX_INPUT            = 0x10_0000_0000;
        const VERTEX_ATTRIBUTE_INPUT = 0x20_0000_0000;
    }
}

bitflags! {
    /// Fine-grained memory access mask, 64-bit (synchronization2-style)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u64 {
        const NONE                 = 0;
        const INDEX_READ           = 0x0000_0002;
        const VERTEX_ATTRIBUTE_READ = 0x0000_0004;
        const UNIFORM_READ         = 0x0000_0008;
        const SHADER_READ          = 0x0000_0020;
        const SHADER_WRITE         = 0x0000_0040;
        const TRANSFER_READ        = 0x0000_0800;
        const TRANSFER_WRITE       = 0x0000_1000;
        const MEMORY_READ          = 0x0000_8000;
        const MEMORY_WRITE         = 0x0001_0000;
        const SHADER_STORAGE_READ  = 0x2_0000_0000;
        const SHADER_STORAGE_WRITE = 0x4_0000_0000;
    }
}

// ===== MEMORY DESCRIPTION =====

/// Driver-reported allocation requirement for a buffer
#[derive(Debug, Clone, Copy)]
pub struct MemoryRequirements {
    /// Required allocation size (may exceed the requested buffer size)
    pub size: u64,
    /// Required allocation alignment
    pub alignment: u64,
    /// Bitmask of memory types the buffer may be bound to
    pub memory_type_bits: u32,
}

/// One memory type exposed by the device
#[derive(Debug, Clone, Copy)]
pub struct MemoryType {
    /// Property flags of this type
    pub property_flags: MemoryPropertyFlags,
    /// Index of the heap backing this type
    pub heap_index: u32,
}

/// One memory heap exposed by the device
#[derive(Debug, Clone, Copy)]
pub struct MemoryHeap {
    /// Heap size in bytes
    pub size: u64,
    /// Whether the heap is device-local
    pub device_local: bool,
}

/// Immutable snapshot of the device's memory topology
#[derive(Debug, Clone, Default)]
pub struct MemoryProperties {
    pub memory_types: Vec<MemoryType>,
    pub memory_heaps: Vec<MemoryHeap>,
}

// ===== CAPABILITIES =====

/// Capability set detected once at driver initialization.
///
/// Feature-gated operations query this and fail with a typed
/// `UnsupportedCapability` error instead of silently switching code
/// paths (the coarse and fine-grained barrier paths are structurally
/// different calls and not interchangeable mid-stream).
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverCaps {
    /// 64-bit stage/access barrier support (synchronization2)
    pub sync2: bool,
    /// Extended dynamic state setters (cull mode, topology, depth state)
    pub extended_dynamic_state: bool,
    /// Device exposes a combined device-local + host-visible memory type
    pub resizable_bar: bool,
}

// ===== SUBMISSION =====

/// Hardware queue class a command buffer is submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Graphics-capable queue (also used for frame pacing submits)
    Graphics,
    /// Transfer queue (staged uploads, resize copies)
    Transfer,
}

/// Usage hint a command buffer must be begun with before recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferUsage {
    /// Recorded once, submitted once, then reset
    OneTimeSubmit,
    /// May be submitted multiple times
    Reusable,
}

// ===== DYNAMIC STATE VALUES =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

/// Winding order considered front-facing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Primitive assembly topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    TriangleList,
    TriangleStrip,
}

/// Depth/stencil comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}
