/// Driver module - narrow graphics driver abstraction

// Module declarations
pub mod driver;
pub mod types;

#[cfg(test)]
pub mod mock_driver;

// Re-export everything from driver.rs and types.rs
pub use driver::*;
pub use types::*;
