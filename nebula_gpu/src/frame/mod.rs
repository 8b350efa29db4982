/// Frame module - frame-in-flight pacing and deferred deletion

pub mod scheduler;

pub use scheduler::*;
