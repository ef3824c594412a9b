/// Buffer module - GPU buffers, their sub-regions, partial updates and recycling

pub mod buffer;
pub mod buffer_data;
pub mod buffer_manager;
pub mod buffer_pool;
pub mod draw_state;
pub mod update_strategy;

pub use buffer::*;
pub use buffer_data::*;
pub use buffer_manager::*;
pub use buffer_pool::BufferPool;
pub use draw_state::*;
pub use update_strategy::UpdateStrategy;

pub(crate) use update_strategy::DirtyUpload;
