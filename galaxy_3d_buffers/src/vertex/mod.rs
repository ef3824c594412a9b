/// Vertex module - attribute streams, vertex blocks and index streams over buffers

pub mod attribute_stream;
pub mod index_buffer;
pub mod vertex_buffer;
pub mod vertex_buffer_data;

pub use attribute_stream::AttributeStream;
pub use index_buffer::{IndexBuffer, IndexElement, IndexType};
pub use vertex_buffer::{RenderMode, VertexBuffer};
pub use vertex_buffer_data::VertexBufferData;
