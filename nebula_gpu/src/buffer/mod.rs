/// Buffer module - managed buffers and the concurrent registry

pub mod managed_buffer;
pub mod registry;

pub use managed_buffer::*;
pub use registry::*;
