/// Transfer module - fence pool, per-thread command pools, staging ring

pub mod command_pool;
pub mod fence_pool;
pub mod staging;

pub use command_pool::*;
pub use fence_pool::*;
pub use staging::*;
