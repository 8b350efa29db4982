//! GpuDriver trait - narrow driver-call surface
//!
//! Everything the core needs from a graphics API, and nothing else:
//! create/destroy for buffers, memory, fences and command pools,
//! map/unmap, copy and barrier recording, and submit-with-fence.
//! Implemented by backend crates (e.g. the ash-based Vulkan driver) and
//! by the in-tree mock for GPU-free tests.

use crate::error::Result;
use crate::sync::DependencyInfo;

use super::types::{
    BufferUsageFlags, CommandBufferUsage, CompareOp, CullMode, DriverCaps, FrontFace,
    MemoryProperties, MemoryRequirements, PrimitiveTopology, QueueKind, RawBuffer,
    RawCommandBuffer, RawCommandPool, RawFence, RawMemory,
};

/// Narrow graphics driver surface
///
/// Every call either succeeds or returns an error the caller treats as
/// fatal for that operation; no call returns a handle that later turns
/// out to be invalid. Destruction calls are infallible by contract
/// (drivers log and continue on internal failure, like a `Drop` impl).
///
/// External synchronization: callers never touch the same command pool,
/// command buffer, or unsignaled fence from two threads at once. The
/// core guarantees this through per-thread pools and fence ownership.
pub trait GpuDriver: Send + Sync {
    /// Capability set detected at initialization
    fn capabilities(&self) -> DriverCaps;

    /// The device's memory topology (immutable after initialization)
    fn memory_properties(&self) -> &MemoryProperties;

    // ===== BUFFERS & MEMORY =====

    /// Create a buffer object (no memory bound yet)
    fn create_buffer(&self, size: u64, usage: BufferUsageFlags) -> Result<RawBuffer>;

    /// Destroy a buffer object
    fn destroy_buffer(&self, buffer: RawBuffer);

    /// Query the driver-reported allocation requirement for a buffer
    fn buffer_memory_requirements(&self, buffer: RawBuffer) -> MemoryRequirements;

    /// Allocate device memory from the given memory type
    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<RawMemory>;

    /// Free a memory allocation
    fn free_memory(&self, memory: RawMemory);

    /// Bind memory to a buffer at offset 0
    fn bind_buffer_memory(&self, buffer: RawBuffer, memory: RawMemory) -> Result<()>;

    /// Map a range of host-visible memory
    fn map_memory(&self, memory: RawMemory, offset: u64, size: u64) -> Result<*mut u8>;

    /// Unmap a previously mapped allocation
    fn unmap_memory(&self, memory: RawMemory);

    // ===== FENCES =====

    /// Create a fence, optionally in the signaled state
    fn create_fence(&self, signaled: bool) -> Result<RawFence>;

    /// Destroy a fence
    fn destroy_fence(&self, fence: RawFence);

    /// Reset a fence to the unsignaled state
    fn reset_fence(&self, fence: RawFence) -> Result<()>;

    /// Query whether a fence is signaled, without blocking
    fn fence_status(&self, fence: RawFence) -> Result<bool>;

    /// Block until a fence signals or the timeout elapses.
    ///
    /// Returns `Error::SyncTimeout` when the timeout elapses first.
    fn wait_for_fence(&self, fence: RawFence, timeout_ns: u64) -> Result<()>;

    // ===== COMMAND POOLS & BUFFERS =====

    /// Create a command pool for the given queue class
    fn create_command_pool(&self, queue: QueueKind) -> Result<RawCommandPool>;

    /// Destroy a command pool (frees its command buffers)
    fn destroy_command_pool(&self, pool: RawCommandPool);

    /// Allocate a primary command buffer from a pool
    fn allocate_command_buffer(&self, pool: RawCommandPool) -> Result<RawCommandBuffer>;

    /// Begin recording with a usage hint
    fn begin_command_buffer(
        &self,
        cmd: RawCommandBuffer,
        usage: CommandBufferUsage,
    ) -> Result<()>;

    /// End recording
    fn end_command_buffer(&self, cmd: RawCommandBuffer) -> Result<()>;

    /// Reset a command buffer back to the recordable state
    fn reset_command_buffer(&self, cmd: RawCommandBuffer) -> Result<()>;

    // ===== RECORDING =====

    /// Record a buffer-to-buffer copy
    fn cmd_copy_buffer(
        &self,
        cmd: RawCommandBuffer,
        src: RawBuffer,
        src_offset: u64,
        dst: RawBuffer,
        dst_offset: u64,
        size: u64,
    );

    /// Record a fine-grained pipeline barrier (64-bit stage/access masks).
    ///
    /// Fails with `UnsupportedCapability` when the device lacks
    /// synchronization2; there is no silent coarse fallback.
    fn cmd_pipeline_barrier(&self, cmd: RawCommandBuffer, dep: &DependencyInfo) -> Result<()>;

    /// Record a dynamic cull-mode change
    fn cmd_set_cull_mode(&self, cmd: RawCommandBuffer, mode: CullMode);

    /// Record a dynamic front-face change
    fn cmd_set_front_face(&self, cmd: RawCommandBuffer, front_face: FrontFace);

    /// Record a dynamic topology change
    fn cmd_set_primitive_topology(&self, cmd: RawCommandBuffer, topology: PrimitiveTopology);

    /// Record a dynamic depth-test toggle
    fn cmd_set_depth_test_enable(&self, cmd: RawCommandBuffer, enable: bool);

    /// Record a dynamic depth-write toggle
    fn cmd_set_depth_write_enable(&self, cmd: RawCommandBuffer, enable: bool);

    /// Record a dynamic depth-compare change
    fn cmd_set_depth_compare_op(&self, cmd: RawCommandBuffer, op: CompareOp);

    /// Record a dynamic stencil-test toggle
    fn cmd_set_stencil_test_enable(&self, cmd: RawCommandBuffer, enable: bool);

    // ===== SUBMISSION =====

    /// Submit command buffers to a queue, signaling `fence` on completion.
    ///
    /// An empty `command_buffers` slice is a valid fence-only submit
    /// (used for frame pacing).
    fn submit(
        &self,
        queue: QueueKind,
        command_buffers: &[RawCommandBuffer],
        fence: RawFence,
    ) -> Result<()>;

    /// Block until all queues are idle
    fn wait_idle(&self) -> Result<()>;
}
