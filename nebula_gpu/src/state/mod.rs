/// State module - dynamic pipeline-state tracking

pub mod dynamic_state;

pub use dynamic_state::*;
