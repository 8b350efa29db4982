//! Headless demo: bring up a Vulkan device, push data through the
//! staging ring, read it back, and print the transfer counters.

use std::sync::Arc;

use nebula_gpu::{GpuConfig, GpuContext};
use nebula_gpu_driver_vulkan::VulkanDriver;

fn run() -> nebula_gpu::Result<()> {
    let config = GpuConfig::default();
    let driver = Arc::new(VulkanDriver::new(&config)?);
    let ctx = GpuContext::new(driver, config)?;

    // Device-local vertex data goes through the staging ring
    let vertices = ctx.create_vertex_buffer(64 * 1024)?;
    let payload: Vec<u8> = (0u8..=255).cycle().take(64 * 1024).collect();
    ctx.upload_data(vertices, 0, &payload)?;

    // Host-visible uniforms take the direct path
    let uniforms = ctx.create_dynamic_uniform_buffer(256)?;
    ctx.upload_data(uniforms, 0, &[0x42; 64])?;

    // A few paced frames with a deferred delete in the middle
    for frame in 0..4 {
        ctx.begin_frame()?;
        if frame == 1 {
            ctx.delete_buffer(uniforms);
        }
        ctx.end_frame()?;
    }

    let back = ctx.read_buffer(vertices, 0, 64 * 1024)?;
    assert_eq!(back, payload, "staged readback mismatch");

    let stats = ctx.stats();
    println!("buffers created:    {}", stats.buffers_created);
    println!("buffers destroyed:  {}", stats.buffers_destroyed);
    println!("bytes transferred:  {}", stats.bytes_transferred);
    println!("staged uploads:     {}", stats.staged_uploads);
    println!("direct uploads:     {}", stats.direct_uploads);
    println!("fence waits:        {}", stats.fence_waits);

    ctx.wait_idle()
}

fn main() {
    if let Err(e) = run() {
        eprintln!("demo failed: {}", e);
        std::process::exit(1);
    }
}
