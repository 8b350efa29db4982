/// Sync module - fine-grained barrier/dependency construction

pub mod barrier;

pub use barrier::*;
