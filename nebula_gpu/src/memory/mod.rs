/// Memory module - device memory-type classification

pub mod memory_type_cache;

pub use memory_type_cache::*;
