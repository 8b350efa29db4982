/*!
# Nebula GPU - Vulkan Driver Backend

Vulkan implementation of the nebula_gpu driver surface.

This crate provides a headless Vulkan 1.3 backend that implements the
`nebula_gpu::driver::GpuDriver` trait using the Ash bindings. There is
no surface or swapchain: the backend exists to move buffer data and
synchronize, not to present.

Capability detection is permissive: a device without synchronization2
still initializes, with `caps.sync2 == false`, and fine-grained barrier
construction fails with a typed error instead of a crash.
*/

// Vulkan implementation module
mod vulkan;

pub use vulkan::VulkanDriver;
