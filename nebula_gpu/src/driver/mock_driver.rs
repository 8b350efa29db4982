//! Mock driver for unit tests (no GPU required)
//!
//! Backs every allocation with a plain byte vector, applies recorded
//! copies when a submission "completes", and keeps an event log so tests
//! can assert synchronization ordering (fence waits vs. submits).
//!
//! Fence model: with `auto_signal` (the default), a submit completes
//! immediately and signals its fence. With `set_auto_signal(false)`,
//! submissions queue up and complete either on `complete_pending()` or
//! when someone waits on their fence - which is how a real GPU looks to
//! the CPU side.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::sync::DependencyInfo;

use super::driver::GpuDriver;
use super::types::{
    BufferUsageFlags, CommandBufferUsage, CompareOp, CullMode, DriverCaps, FrontFace,
    MemoryHeap, MemoryProperties, MemoryRequirements, MemoryType, MemoryPropertyFlags,
    PrimitiveTopology, QueueKind, RawBuffer, RawCommandBuffer, RawCommandPool, RawFence,
    RawMemory,
};

// ============================================================================
// Recorded commands and events
// ============================================================================

/// Command recorded into a mock command buffer
#[derive(Debug, Clone)]
pub enum MockCmd {
    Copy {
        src: RawBuffer,
        src_offset: u64,
        dst: RawBuffer,
        dst_offset: u64,
        size: u64,
    },
    Barrier {
        barrier_count: usize,
    },
    SetState {
        name: &'static str,
        value: u64,
    },
}

/// Observable synchronization event, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    FenceWait(RawFence),
    FenceReset(RawFence),
    Submit { fence: RawFence },
    BufferDestroyed(RawBuffer),
}

// ============================================================================
// Internal state
// ============================================================================

struct MockBuffer {
    size: u64,
    #[allow(dead_code)]
    usage: BufferUsageFlags,
    memory: Option<u64>,
}

struct MockMemory {
    bytes: Vec<u8>,
}

struct MockCommandBuffer {
    recording: bool,
    ended: bool,
    commands: Vec<MockCmd>,
}

struct QueuedSubmit {
    command_buffers: Vec<u64>,
    fence: u64,
}

struct MockState {
    buffers: HashMap<u64, MockBuffer>,
    memories: HashMap<u64, MockMemory>,
    fences: HashMap<u64, bool>,
    pools: HashMap<u64, QueueKind>,
    command_buffers: HashMap<u64, MockCommandBuffer>,
    queued: Vec<QueuedSubmit>,
    events: Vec<MockEvent>,
    wait_timeouts: Vec<u64>,
    destroyed_buffers: Vec<u64>,
    auto_signal: bool,
    fail_next_allocation: bool,
}

/// Mock GpuDriver implementation
pub struct MockDriver {
    caps: DriverCaps,
    memory_properties: MemoryProperties,
    next_handle: AtomicU64,
    state: Mutex<MockState>,
}

impl MockDriver {
    /// Create a mock with the default memory table: a pure device-local
    /// type, a host-visible type, a host-cached type, and a combined
    /// device-local + host-visible (ReBAR-style) type.
    pub fn new() -> Self {
        Self::with_memory_types(vec![
            MemoryType {
                property_flags: MemoryPropertyFlags::DEVICE_LOCAL,
                heap_index: 0,
            },
            MemoryType {
                property_flags: MemoryPropertyFlags::HOST_VISIBLE
                    | MemoryPropertyFlags::HOST_COHERENT,
                heap_index: 1,
            },
            MemoryType {
                property_flags: MemoryPropertyFlags::HOST_VISIBLE
                    | MemoryPropertyFlags::HOST_COHERENT
                    | MemoryPropertyFlags::HOST_CACHED,
                heap_index: 1,
            },
            MemoryType {
                property_flags: MemoryPropertyFlags::DEVICE_LOCAL
                    | MemoryPropertyFlags::HOST_VISIBLE
                    | MemoryPropertyFlags::HOST_COHERENT,
                heap_index: 0,
            },
        ])
    }

    /// Create a mock with a custom memory-type table
    pub fn with_memory_types(memory_types: Vec<MemoryType>) -> Self {
        let resizable_bar = memory_types.iter().any(|t| {
            t.property_flags.contains(
                MemoryPropertyFlags::DEVICE_LOCAL | MemoryPropertyFlags::HOST_VISIBLE,
            )
        });
        Self {
            caps: DriverCaps {
                sync2: true,
                extended_dynamic_state: true,
                resizable_bar,
            },
            memory_properties: MemoryProperties {
                memory_types,
                memory_heaps: vec![
                    MemoryHeap {
                        size: 4 << 30,
                        device_local: true,
                    },
                    MemoryHeap {
                        size: 8 << 30,
                        device_local: false,
                    },
                ],
            },
            next_handle: AtomicU64::new(1),
            state: Mutex::new(MockState {
                buffers: HashMap::new(),
                memories: HashMap::new(),
                fences: HashMap::new(),
                pools: HashMap::new(),
                command_buffers: HashMap::new(),
                queued: Vec::new(),
                events: Vec::new(),
                wait_timeouts: Vec::new(),
                destroyed_buffers: Vec::new(),
                auto_signal: true,
                fail_next_allocation: false,
            }),
        }
    }

    /// Override the capability set (e.g. to test sync2 gating)
    pub fn with_caps(mut self, caps: DriverCaps) -> Self {
        self.caps = caps;
        self
    }

    fn next(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn execute(state: &mut MockState, submit: &QueuedSubmit) {
        for cmd_handle in &submit.command_buffers {
            let commands = state
                .command_buffers
                .get(cmd_handle)
                .map(|cb| cb.commands.clone())
                .unwrap_or_default();
            for cmd in commands {
                if let MockCmd::Copy {
                    src,
                    src_offset,
                    dst,
                    dst_offset,
                    size,
                } = cmd
                {
                    let src_mem = state.buffers.get(&src.0).and_then(|b| b.memory);
                    let dst_mem = state.buffers.get(&dst.0).and_then(|b| b.memory);
                    if let (Some(src_mem), Some(dst_mem)) = (src_mem, dst_mem) {
                        let chunk: Vec<u8> = state.memories[&src_mem].bytes
                            [src_offset as usize..(src_offset + size) as usize]
                            .to_vec();
                        if let Some(mem) = state.memories.get_mut(&dst_mem) {
                            mem.bytes[dst_offset as usize..(dst_offset + size) as usize]
                                .copy_from_slice(&chunk);
                        }
                    }
                }
            }
        }
        state.fences.insert(submit.fence, true);
    }

    // ===== TEST INTROSPECTION =====

    /// Switch between immediate completion and queued submissions
    pub fn set_auto_signal(&self, auto: bool) {
        self.state.lock().auto_signal = auto;
    }

    /// Complete all queued submissions (apply copies, signal fences)
    pub fn complete_pending(&self) {
        let mut state = self.state.lock();
        let queued = std::mem::take(&mut state.queued);
        for submit in &queued {
            Self::execute(&mut state, submit);
        }
    }

    /// Make the next `allocate_memory` call fail with `OutOfMemory`
    pub fn fail_next_memory_allocation(&self) {
        self.state.lock().fail_next_allocation = true;
    }

    /// Bytes currently backing a buffer (via its bound memory)
    pub fn read_buffer_bytes(&self, buffer: RawBuffer) -> Vec<u8> {
        let state = self.state.lock();
        let buf = &state.buffers[&buffer.0];
        let mem = buf.memory.expect("buffer has no bound memory");
        state.memories[&mem].bytes[..buf.size as usize].to_vec()
    }

    /// Event log, in call order
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().events.clone()
    }

    /// Timeouts passed to `wait_for_fence`, in call order
    pub fn wait_timeouts(&self) -> Vec<u64> {
        self.state.lock().wait_timeouts.clone()
    }

    /// Number of live (not yet destroyed) buffers
    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Whether a buffer handle has been destroyed
    pub fn is_buffer_destroyed(&self, buffer: RawBuffer) -> bool {
        self.state.lock().destroyed_buffers.contains(&buffer.0)
    }

    /// Commands recorded into a command buffer (kept until reset)
    pub fn recorded_commands(&self, cmd: RawCommandBuffer) -> Vec<MockCmd> {
        self.state.lock().command_buffers[&cmd.0].commands.clone()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDriver for MockDriver {
    fn capabilities(&self) -> DriverCaps {
        self.caps
    }

    fn memory_properties(&self) -> &MemoryProperties {
        &self.memory_properties
    }

    fn create_buffer(&self, size: u64, usage: BufferUsageFlags) -> Result<RawBuffer> {
        let handle = self.next();
        self.state.lock().buffers.insert(
            handle,
            MockBuffer {
                size,
                usage,
                memory: None,
            },
        );
        Ok(RawBuffer(handle))
    }

    fn destroy_buffer(&self, buffer: RawBuffer) {
        let mut state = self.state.lock();
        state.buffers.remove(&buffer.0);
        state.destroyed_buffers.push(buffer.0);
        state.events.push(MockEvent::BufferDestroyed(buffer));
    }

    fn buffer_memory_requirements(&self, buffer: RawBuffer) -> MemoryRequirements {
        let state = self.state.lock();
        let size = state.buffers[&buffer.0].size;
        MemoryRequirements {
            // Drivers commonly round allocations up; emulate that so the
            // registry's "allocate the reported size" path is exercised.
            size: size.next_multiple_of(64),
            alignment: 64,
            memory_type_bits: !0,
        }
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<RawMemory> {
        if memory_type_index as usize >= self.memory_properties.memory_types.len() {
            return Err(Error::BackendError(format!(
                "Unknown memory type index {}",
                memory_type_index
            )));
        }
        let mut state = self.state.lock();
        if state.fail_next_allocation {
            state.fail_next_allocation = false;
            return Err(Error::OutOfMemory);
        }
        let handle = self.next();
        state.memories.insert(
            handle,
            MockMemory {
                bytes: vec![0u8; size as usize],
            },
        );
        Ok(RawMemory(handle))
    }

    fn free_memory(&self, memory: RawMemory) {
        self.state.lock().memories.remove(&memory.0);
    }

    fn bind_buffer_memory(&self, buffer: RawBuffer, memory: RawMemory) -> Result<()> {
        let mut state = self.state.lock();
        match state.buffers.get_mut(&buffer.0) {
            Some(buf) => {
                buf.memory = Some(memory.0);
                Ok(())
            }
            None => Err(Error::BackendError(format!(
                "bind_buffer_memory on unknown buffer {}",
                buffer.0
            ))),
        }
    }

    fn map_memory(&self, memory: RawMemory, offset: u64, _size: u64) -> Result<*mut u8> {
        let mut state = self.state.lock();
        match state.memories.get_mut(&memory.0) {
            // The Vec's heap storage never moves (allocations are never
            // resized), so the pointer stays valid until free_memory.
            Some(mem) => Ok(unsafe { mem.bytes.as_mut_ptr().add(offset as usize) }),
            None => Err(Error::BackendError(format!(
                "map_memory on unknown allocation {}",
                memory.0
            ))),
        }
    }

    fn unmap_memory(&self, _memory: RawMemory) {}

    fn create_fence(&self, signaled: bool) -> Result<RawFence> {
        let handle = self.next();
        self.state.lock().fences.insert(handle, signaled);
        Ok(RawFence(handle))
    }

    fn destroy_fence(&self, fence: RawFence) {
        self.state.lock().fences.remove(&fence.0);
    }

    fn reset_fence(&self, fence: RawFence) -> Result<()> {
        let mut state = self.state.lock();
        state.events.push(MockEvent::FenceReset(fence));
        state.fences.insert(fence.0, false);
        Ok(())
    }

    fn fence_status(&self, fence: RawFence) -> Result<bool> {
        Ok(*self.state.lock().fences.get(&fence.0).unwrap_or(&false))
    }

    fn wait_for_fence(&self, fence: RawFence, timeout_ns: u64) -> Result<()> {
        let mut state = self.state.lock();
        state.events.push(MockEvent::FenceWait(fence));
        state.wait_timeouts.push(timeout_ns);
        if *state.fences.get(&fence.0).unwrap_or(&false) {
            return Ok(());
        }
        // Unsignaled: the "GPU" finishes the queued submission that will
        // signal this fence, exactly as a real wait would observe.
        if let Some(pos) = state.queued.iter().position(|s| s.fence == fence.0) {
            let submit = state.queued.remove(pos);
            Self::execute(&mut state, &submit);
            return Ok(());
        }
        Err(Error::SyncTimeout("mock fence"))
    }

    fn create_command_pool(&self, queue: QueueKind) -> Result<RawCommandPool> {
        let handle = self.next();
        self.state.lock().pools.insert(handle, queue);
        Ok(RawCommandPool(handle))
    }

    fn destroy_command_pool(&self, pool: RawCommandPool) {
        self.state.lock().pools.remove(&pool.0);
    }

    fn allocate_command_buffer(&self, pool: RawCommandPool) -> Result<RawCommandBuffer> {
        let mut state = self.state.lock();
        if !state.pools.contains_key(&pool.0) {
            return Err(Error::BackendError(format!(
                "allocate_command_buffer on unknown pool {}",
                pool.0
            )));
        }
        drop(state);
        let handle = self.next();
        self.state.lock().command_buffers.insert(
            handle,
            MockCommandBuffer {
                recording: false,
                ended: false,
                commands: Vec::new(),
            },
        );
        Ok(RawCommandBuffer(handle))
    }

    fn begin_command_buffer(
        &self,
        cmd: RawCommandBuffer,
        _usage: CommandBufferUsage,
    ) -> Result<()> {
        let mut state = self.state.lock();
        match state.command_buffers.get_mut(&cmd.0) {
            Some(cb) if !cb.recording => {
                cb.recording = true;
                cb.ended = false;
                cb.commands.clear();
                Ok(())
            }
            Some(_) => Err(Error::BackendError(
                "Command buffer already recording".to_string(),
            )),
            None => Err(Error::BackendError(format!(
                "begin on unknown command buffer {}",
                cmd.0
            ))),
        }
    }

    fn end_command_buffer(&self, cmd: RawCommandBuffer) -> Result<()> {
        let mut state = self.state.lock();
        match state.command_buffers.get_mut(&cmd.0) {
            Some(cb) if cb.recording => {
                cb.recording = false;
                cb.ended = true;
                Ok(())
            }
            Some(_) => Err(Error::BackendError(
                "Command buffer not recording".to_string(),
            )),
            None => Err(Error::BackendError(format!(
                "end on unknown command buffer {}",
                cmd.0
            ))),
        }
    }

    fn reset_command_buffer(&self, cmd: RawCommandBuffer) -> Result<()> {
        let mut state = self.state.lock();
        match state.command_buffers.get_mut(&cmd.0) {
            Some(cb) => {
                cb.recording = false;
                cb.ended = false;
                cb.commands.clear();
                Ok(())
            }
            None => Err(Error::BackendError(format!(
                "reset on unknown command buffer {}",
                cmd.0
            ))),
        }
    }

    fn cmd_copy_buffer(
        &self,
        cmd: RawCommandBuffer,
        src: RawBuffer,
        src_offset: u64,
        dst: RawBuffer,
        dst_offset: u64,
        size: u64,
    ) {
        if let Some(cb) = self.state.lock().command_buffers.get_mut(&cmd.0) {
            cb.commands.push(MockCmd::Copy {
                src,
                src_offset,
                dst,
                dst_offset,
                size,
            });
        }
    }

    fn cmd_pipeline_barrier(&self, cmd: RawCommandBuffer, dep: &DependencyInfo) -> Result<()> {
        if !self.caps.sync2 {
            return Err(Error::UnsupportedCapability("synchronization2"));
        }
        if let Some(cb) = self.state.lock().command_buffers.get_mut(&cmd.0) {
            cb.commands.push(MockCmd::Barrier {
                barrier_count: dep.buffer_barriers.len(),
            });
        }
        Ok(())
    }

    fn cmd_set_cull_mode(&self, cmd: RawCommandBuffer, mode: CullMode) {
        self.record_state(cmd, "cull_mode", mode as u64);
    }

    fn cmd_set_front_face(&self, cmd: RawCommandBuffer, front_face: FrontFace) {
        self.record_state(cmd, "front_face", front_face as u64);
    }

    fn cmd_set_primitive_topology(&self, cmd: RawCommandBuffer, topology: PrimitiveTopology) {
        self.record_state(cmd, "topology", topology as u64);
    }

    fn cmd_set_depth_test_enable(&self, cmd: RawCommandBuffer, enable: bool) {
        self.record_state(cmd, "depth_test", enable as u64);
    }

    fn cmd_set_depth_write_enable(&self, cmd: RawCommandBuffer, enable: bool) {
        self.record_state(cmd, "depth_write", enable as u64);
    }

    fn cmd_set_depth_compare_op(&self, cmd: RawCommandBuffer, op: CompareOp) {
        self.record_state(cmd, "depth_compare", op as u64);
    }

    fn cmd_set_stencil_test_enable(&self, cmd: RawCommandBuffer, enable: bool) {
        self.record_state(cmd, "stencil_test", enable as u64);
    }

    fn submit(
        &self,
        queue: QueueKind,
        command_buffers: &[RawCommandBuffer],
        fence: RawFence,
    ) -> Result<()> {
        let _ = queue;
        let mut state = self.state.lock();
        for cmd in command_buffers {
            match state.command_buffers.get(&cmd.0) {
                Some(cb) if cb.ended => {}
                Some(_) => {
                    return Err(Error::BackendError(
                        "Submitted command buffer was not ended".to_string(),
                    ))
                }
                None => {
                    return Err(Error::BackendError(format!(
                        "Submitted unknown command buffer {}",
                        cmd.0
                    )))
                }
            }
        }
        state.events.push(MockEvent::Submit { fence });
        let submit = QueuedSubmit {
            command_buffers: command_buffers.iter().map(|c| c.0).collect(),
            fence: fence.0,
        };
        if state.auto_signal {
            Self::execute(&mut state, &submit);
        } else {
            state.queued.push(submit);
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = self.state.lock();
        let queued = std::mem::take(&mut state.queued);
        for submit in &queued {
            Self::execute(&mut state, submit);
        }
        Ok(())
    }
}

impl MockDriver {
    fn record_state(&self, cmd: RawCommandBuffer, name: &'static str, value: u64) {
        if let Some(cb) = self.state.lock().command_buffers.get_mut(&cmd.0) {
            cb.commands.push(MockCmd::SetState { name, value });
        }
    }
}
