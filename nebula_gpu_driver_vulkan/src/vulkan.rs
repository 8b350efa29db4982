//! VulkanDriver - ash-based GpuDriver implementation
//!
//! Headless Vulkan 1.3 device: instance without surface extensions,
//! first physical device, a graphics queue plus a dedicated transfer
//! queue when the hardware has one. Handles cross the driver boundary
//! as raw u64 and round-trip through `ash::vk::Handle`.

use ash::vk::{self, Handle};
use parking_lot::Mutex;

use nebula_gpu::driver::{
    BufferUsageFlags, CommandBufferUsage, CompareOp, CullMode, DriverCaps, FrontFace, GpuDriver,
    MemoryHeap, MemoryProperties, MemoryPropertyFlags, MemoryRequirements, MemoryType,
    PrimitiveTopology, QueueKind, RawBuffer, RawCommandBuffer, RawCommandPool, RawFence,
    RawMemory,
};
use nebula_gpu::error::{Error, Result};
use nebula_gpu::sync::DependencyInfo;
use nebula_gpu::{gpu_error, gpu_info, gpu_warn, GpuConfig};

const SOURCE: &str = "nebula::vulkan";

/// Both queues sit behind one lock: they may alias the same underlying
/// queue on single-family hardware, and vkQueueSubmit requires external
/// synchronization per queue.
struct QueueTable {
    graphics: vk::Queue,
    transfer: vk::Queue,
}

/// Vulkan implementation of the driver surface
pub struct VulkanDriver {
    _entry: ash::Entry,
    instance: ash::Instance,
    device: ash::Device,
    caps: DriverCaps,
    memory_properties: MemoryProperties,
    graphics_family: u32,
    transfer_family: u32,
    queues: Mutex<QueueTable>,
}

impl VulkanDriver {
    /// Initialize a headless Vulkan 1.3 device.
    ///
    /// Capability downgrades (missing synchronization2) do not fail
    /// initialization; a missing Vulkan 1.3 device does.
    pub fn new(config: &GpuConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                gpu_error!(SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_info = vk::ApplicationInfo::default()
                .application_name(c"Nebula Application")
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Nebula")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let layer_names = if config.enable_validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                gpu_error!(SOURCE, "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
                gpu_error!(SOURCE, "Failed to enumerate physical devices: {:?}", e);
                Error::InitializationFailed(format!(
                    "Failed to enumerate physical devices: {:?}",
                    e
                ))
            })?;
            let physical_device = physical_devices.into_iter().next().ok_or_else(|| {
                gpu_error!(SOURCE, "No Vulkan-capable GPU found");
                Error::InitializationFailed("No Vulkan-capable GPU found".to_string())
            })?;

            let properties = instance.get_physical_device_properties(physical_device);
            if properties.api_version < vk::API_VERSION_1_3 {
                gpu_error!(SOURCE, "Device does not support Vulkan 1.3");
                return Err(Error::InitializationFailed(
                    "Device does not support Vulkan 1.3".to_string(),
                ));
            }

            // Feature detection; missing sync2 downgrades caps only
            let mut vk13 = vk::PhysicalDeviceVulkan13Features::default();
            let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut vk13);
            instance.get_physical_device_features2(physical_device, &mut features2);
            let sync2 = vk13.synchronization2 == vk::TRUE;
            if !sync2 {
                gpu_warn!(
                    SOURCE,
                    "synchronization2 unavailable; fine-grained barriers disabled"
                );
            }

            let queue_families =
                instance.get_physical_device_queue_family_properties(physical_device);

            let graphics_family = queue_families
                .iter()
                .enumerate()
                .find(|(_, qf)| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|(i, _)| i as u32)
                .ok_or_else(|| {
                    gpu_error!(SOURCE, "No graphics queue family found");
                    Error::InitializationFailed("No graphics queue family found".to_string())
                })?;

            // Prefer a transfer-only family; fall back to the graphics one
            let transfer_family = queue_families
                .iter()
                .enumerate()
                .find(|(_, qf)| {
                    qf.queue_flags.contains(vk::QueueFlags::TRANSFER)
                        && !qf.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                        && !qf.queue_flags.contains(vk::QueueFlags::COMPUTE)
                })
                .map(|(i, _)| i as u32)
                .unwrap_or(graphics_family);

            let queue_priorities = [1.0];
            let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> =
                if graphics_family == transfer_family {
                    vec![vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(graphics_family)
                        .queue_priorities(&queue_priorities)]
                } else {
                    vec![
                        vk::DeviceQueueCreateInfo::default()
                            .queue_family_index(graphics_family)
                            .queue_priorities(&queue_priorities),
                        vk::DeviceQueueCreateInfo::default()
                            .queue_family_index(transfer_family)
                            .queue_priorities(&queue_priorities),
                    ]
                };

            let mut enabled13 = vk::PhysicalDeviceVulkan13Features::default()
                .synchronization2(sync2);
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .push_next(&mut enabled13);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    gpu_error!(SOURCE, "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics_queue = device.get_device_queue(graphics_family, 0);
            let transfer_queue = device.get_device_queue(transfer_family, 0);

            let vk_memory = instance.get_physical_device_memory_properties(physical_device);
            let memory_types: Vec<MemoryType> = vk_memory.memory_types
                [..vk_memory.memory_type_count as usize]
                .iter()
                .map(|t| MemoryType {
                    property_flags: MemoryPropertyFlags::from_bits_truncate(
                        t.property_flags.as_raw(),
                    ),
                    heap_index: t.heap_index,
                })
                .collect();
            let memory_heaps = vk_memory.memory_heaps[..vk_memory.memory_heap_count as usize]
                .iter()
                .map(|h| MemoryHeap {
                    size: h.size,
                    device_local: h.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL),
                })
                .collect();
            let resizable_bar = memory_types.iter().any(|t| {
                t.property_flags.contains(
                    MemoryPropertyFlags::DEVICE_LOCAL | MemoryPropertyFlags::HOST_VISIBLE,
                )
            });

            let caps = DriverCaps {
                sync2,
                // Extended dynamic state is core in 1.3, which we require
                extended_dynamic_state: true,
                resizable_bar,
            };

            gpu_info!(
                SOURCE,
                "Vulkan device ready: graphics family {}, transfer family {}{}, sync2={}, rebar={}",
                graphics_family,
                transfer_family,
                if transfer_family != graphics_family {
                    " (dedicated)"
                } else {
                    ""
                },
                sync2,
                resizable_bar
            );

            Ok(Self {
                _entry: entry,
                instance,
                device,
                caps,
                memory_properties: MemoryProperties {
                    memory_types,
                    memory_heaps,
                },
                graphics_family,
                transfer_family,
                queues: Mutex::new(QueueTable {
                    graphics: graphics_queue,
                    transfer: transfer_queue,
                }),
            })
        }
    }

    fn family_for(&self, queue: QueueKind) -> u32 {
        match queue {
            QueueKind::Graphics => self.graphics_family,
            QueueKind::Transfer => self.transfer_family,
        }
    }
}

// ===== HANDLE CONVERSIONS =====

fn vk_buffer(raw: RawBuffer) -> vk::Buffer {
    vk::Buffer::from_raw(raw.0)
}

fn vk_memory(raw: RawMemory) -> vk::DeviceMemory {
    vk::DeviceMemory::from_raw(raw.0)
}

fn vk_fence(raw: RawFence) -> vk::Fence {
    vk::Fence::from_raw(raw.0)
}

fn vk_pool(raw: RawCommandPool) -> vk::CommandPool {
    vk::CommandPool::from_raw(raw.0)
}

fn vk_cmd(raw: RawCommandBuffer) -> vk::CommandBuffer {
    vk::CommandBuffer::from_raw(raw.0)
}

fn vk_cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

fn vk_front_face(front_face: FrontFace) -> vk::FrontFace {
    match front_face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

fn vk_topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

fn vk_compare_op(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

impl GpuDriver for VulkanDriver {
    fn capabilities(&self) -> DriverCaps {
        self.caps
    }

    fn memory_properties(&self) -> &MemoryProperties {
        &self.memory_properties
    }

    fn create_buffer(&self, size: u64, usage: BufferUsageFlags) -> Result<RawBuffer> {
        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(vk::BufferUsageFlags::from_raw(usage.bits()))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&create_info, None) }.map_err(|e| {
            gpu_error!(SOURCE, "Failed to create buffer ({} bytes): {:?}", size, e);
            Error::BackendError(format!("Failed to create buffer: {:?}", e))
        })?;
        Ok(RawBuffer(buffer.as_raw()))
    }

    fn destroy_buffer(&self, buffer: RawBuffer) {
        unsafe { self.device.destroy_buffer(vk_buffer(buffer), None) };
    }

    fn buffer_memory_requirements(&self, buffer: RawBuffer) -> MemoryRequirements {
        let req = unsafe { self.device.get_buffer_memory_requirements(vk_buffer(buffer)) };
        MemoryRequirements {
            size: req.size,
            alignment: req.alignment,
            memory_type_bits: req.memory_type_bits,
        }
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<RawMemory> {
        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type_index);
        let memory =
            unsafe { self.device.allocate_memory(&allocate_info, None) }.map_err(|e| match e {
                vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                    gpu_error!(SOURCE, "Out of memory allocating {} bytes", size);
                    Error::OutOfMemory
                }
                other => {
                    gpu_error!(SOURCE, "Failed to allocate memory: {:?}", other);
                    Error::BackendError(format!("Failed to allocate memory: {:?}", other))
                }
            })?;
        Ok(RawMemory(memory.as_raw()))
    }

    fn free_memory(&self, memory: RawMemory) {
        unsafe { self.device.free_memory(vk_memory(memory), None) };
    }

    fn bind_buffer_memory(&self, buffer: RawBuffer, memory: RawMemory) -> Result<()> {
        unsafe {
            self.device
                .bind_buffer_memory(vk_buffer(buffer), vk_memory(memory), 0)
        }
        .map_err(|e| {
            gpu_error!(SOURCE, "Failed to bind buffer memory: {:?}", e);
            Error::BackendError(format!("Failed to bind buffer memory: {:?}", e))
        })
    }

    fn map_memory(&self, memory: RawMemory, offset: u64, size: u64) -> Result<*mut u8> {
        let ptr = unsafe {
            self.device.map_memory(
                vk_memory(memory),
                offset,
                size,
                vk::MemoryMapFlags::empty(),
            )
        }
        .map_err(|e| {
            gpu_error!(SOURCE, "Failed to map memory: {:?}", e);
            Error::BackendError(format!("Failed to map memory: {:?}", e))
        })?;
        Ok(ptr as *mut u8)
    }

    fn unmap_memory(&self, memory: RawMemory) {
        unsafe { self.device.unmap_memory(vk_memory(memory)) };
    }

    fn create_fence(&self, signaled: bool) -> Result<RawFence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { self.device.create_fence(&create_info, None) }.map_err(|e| {
            gpu_error!(SOURCE, "Failed to create fence: {:?}", e);
            Error::BackendError(format!("Failed to create fence: {:?}", e))
        })?;
        Ok(RawFence(fence.as_raw()))
    }

    fn destroy_fence(&self, fence: RawFence) {
        unsafe { self.device.destroy_fence(vk_fence(fence), None) };
    }

    fn reset_fence(&self, fence: RawFence) -> Result<()> {
        unsafe { self.device.reset_fences(&[vk_fence(fence)]) }.map_err(|e| {
            gpu_error!(SOURCE, "Failed to reset fence: {:?}", e);
            Error::BackendError(format!("Failed to reset fence: {:?}", e))
        })
    }

    fn fence_status(&self, fence: RawFence) -> Result<bool> {
        unsafe { self.device.get_fence_status(vk_fence(fence)) }.map_err(|e| {
            gpu_error!(SOURCE, "Failed to query fence status: {:?}", e);
            Error::BackendError(format!("Failed to query fence status: {:?}", e))
        })
    }

    fn wait_for_fence(&self, fence: RawFence, timeout_ns: u64) -> Result<()> {
        match unsafe {
            self.device
                .wait_for_fences(&[vk_fence(fence)], true, timeout_ns)
        } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(Error::SyncTimeout("fence wait")),
            Err(e) => {
                gpu_error!(SOURCE, "Failed to wait for fence: {:?}", e);
                Err(Error::BackendError(format!(
                    "Failed to wait for fence: {:?}",
                    e
                )))
            }
        }
    }

    fn create_command_pool(&self, queue: QueueKind) -> Result<RawCommandPool> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.family_for(queue))
            .flags(
                vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            );
        let pool =
            unsafe { self.device.create_command_pool(&create_info, None) }.map_err(|e| {
                gpu_error!(SOURCE, "Failed to create command pool: {:?}", e);
                Error::BackendError(format!("Failed to create command pool: {:?}", e))
            })?;
        Ok(RawCommandPool(pool.as_raw()))
    }

    fn destroy_command_pool(&self, pool: RawCommandPool) {
        unsafe { self.device.destroy_command_pool(vk_pool(pool), None) };
    }

    fn allocate_command_buffer(&self, pool: RawCommandPool) -> Result<RawCommandBuffer> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(vk_pool(pool))
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers =
            unsafe { self.device.allocate_command_buffers(&allocate_info) }.map_err(|e| {
                gpu_error!(SOURCE, "Failed to allocate command buffer: {:?}", e);
                Error::BackendError(format!("Failed to allocate command buffer: {:?}", e))
            })?;
        Ok(RawCommandBuffer(buffers[0].as_raw()))
    }

    fn begin_command_buffer(
        &self,
        cmd: RawCommandBuffer,
        usage: CommandBufferUsage,
    ) -> Result<()> {
        let flags = match usage {
            CommandBufferUsage::OneTimeSubmit => vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            CommandBufferUsage::Reusable => vk::CommandBufferUsageFlags::empty(),
        };
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        unsafe { self.device.begin_command_buffer(vk_cmd(cmd), &begin_info) }.map_err(|e| {
            gpu_error!(SOURCE, "Failed to begin command buffer: {:?}", e);
            Error::BackendError(format!("Failed to begin command buffer: {:?}", e))
        })
    }

    fn end_command_buffer(&self, cmd: RawCommandBuffer) -> Result<()> {
        unsafe { self.device.end_command_buffer(vk_cmd(cmd)) }.map_err(|e| {
            gpu_error!(SOURCE, "Failed to end command buffer: {:?}", e);
            Error::BackendError(format!("Failed to end command buffer: {:?}", e))
        })
    }

    fn reset_command_buffer(&self, cmd: RawCommandBuffer) -> Result<()> {
        unsafe {
            self.device
                .reset_command_buffer(vk_cmd(cmd), vk::CommandBufferResetFlags::empty())
        }
        .map_err(|e| {
            gpu_error!(SOURCE, "Failed to reset command buffer: {:?}", e);
            Error::BackendError(format!("Failed to reset command buffer: {:?}", e))
        })
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
        let region = vk::BufferCopy::default()
            .src_offset(src_offset)
            .dst_offset(dst_offset)
            .size(size);
        unsafe {
            self.device
                .cmd_copy_buffer(vk_cmd(cmd), vk_buffer(src), vk_buffer(dst), &[region])
        };
    }

    fn cmd_pipeline_barrier(&self, cmd: RawCommandBuffer, dep: &DependencyInfo) -> Result<()> {
        if !self.caps.sync2 {
            return Err(Error::UnsupportedCapability("synchronization2"));
        }
        let barriers: Vec<vk::BufferMemoryBarrier2> = dep
            .buffer_barriers
            .iter()
            .map(|b| {
                vk::BufferMemoryBarrier2::default()
                    .src_stage_mask(vk::PipelineStageFlags2::from_raw(b.src_stage.bits()))
                    .src_access_mask(vk::AccessFlags2::from_raw(b.src_access.bits()))
                    .dst_stage_mask(vk::PipelineStageFlags2::from_raw(b.dst_stage.bits()))
                    .dst_access_mask(vk::AccessFlags2::from_raw(b.dst_access.bits()))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(vk_buffer(b.buffer))
                    .offset(b.offset)
                    .size(b.size)
            })
            .collect();
        let dependency_info = vk::DependencyInfo::default().buffer_memory_barriers(&barriers);
        unsafe {
            self.device
                .cmd_pipeline_barrier2(vk_cmd(cmd), &dependency_info)
        };
        Ok(())
    }

    fn cmd_set_cull_mode(&self, cmd: RawCommandBuffer, mode: CullMode) {
        unsafe { self.device.cmd_set_cull_mode(vk_cmd(cmd), vk_cull_mode(mode)) };
    }

    fn cmd_set_front_face(&self, cmd: RawCommandBuffer, front_face: FrontFace) {
        unsafe {
            self.device
                .cmd_set_front_face(vk_cmd(cmd), vk_front_face(front_face))
        };
    }

    fn cmd_set_primitive_topology(&self, cmd: RawCommandBuffer, topology: PrimitiveTopology) {
        unsafe {
            self.device
                .cmd_set_primitive_topology(vk_cmd(cmd), vk_topology(topology))
        };
    }

    fn cmd_set_depth_test_enable(&self, cmd: RawCommandBuffer, enable: bool) {
        unsafe { self.device.cmd_set_depth_test_enable(vk_cmd(cmd), enable) };
    }

    fn cmd_set_depth_write_enable(&self, cmd: RawCommandBuffer, enable: bool) {
        unsafe { self.device.cmd_set_depth_write_enable(vk_cmd(cmd), enable) };
    }

    fn cmd_set_depth_compare_op(&self, cmd: RawCommandBuffer, op: CompareOp) {
        unsafe {
            self.device
                .cmd_set_depth_compare_op(vk_cmd(cmd), vk_compare_op(op))
        };
    }

    fn cmd_set_stencil_test_enable(&self, cmd: RawCommandBuffer, enable: bool) {
        unsafe { self.device.cmd_set_stencil_test_enable(vk_cmd(cmd), enable) };
    }

    fn submit(
        &self,
        queue: QueueKind,
        command_buffers: &[RawCommandBuffer],
        fence: RawFence,
    ) -> Result<()> {
        let cmds: Vec<vk::CommandBuffer> =
            command_buffers.iter().map(|c| vk_cmd(*c)).collect();
        let submit_info = vk::SubmitInfo::default().command_buffers(&cmds);
        let queues = self.queues.lock();
        let vk_queue = match queue {
            QueueKind::Graphics => queues.graphics,
            QueueKind::Transfer => queues.transfer,
        };
        unsafe {
            self.device
                .queue_submit(vk_queue, &[submit_info], vk_fence(fence))
        }
        .map_err(|e| {
            gpu_error!(SOURCE, "Failed to submit to {:?} queue: {:?}", queue, e);
            Error::BackendError(format!("Failed to submit: {:?}", e))
        })
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.map_err(|e| {
            gpu_error!(SOURCE, "device_wait_idle failed: {:?}", e);
            Error::BackendError(format!("device_wait_idle failed: {:?}", e))
        })
    }
}

impl Drop for VulkanDriver {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
