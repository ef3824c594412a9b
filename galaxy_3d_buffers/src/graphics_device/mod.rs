/// Graphics device module - driver abstraction consumed by the buffer layer

pub mod graphics_device;
pub mod types;

pub use graphics_device::*;
pub use types::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
