/*!
# Galaxy 3D Buffers

GPU buffer layer of the Galaxy 3D rendering engine.

The crate sits between the geometry code and a graphics driver reached through
the `GraphicsDevice` trait. It owns GPU buffer objects, tracks which bytes of
their CPU copies changed, and uploads the changes once per frame with the
cheapest mapping strategy the device offers.

## Architecture

- **BufferManager**: Per-context owner of buffers, their data and the pending update list
- **Buffer / BufferData**: One GPU buffer object and the sub-regions laid out inside it
- **BufferPool**: Power-of-two recycling cache of spare GPU buffer objects
- **VertexBuffer**: Attribute streams over a vertex buffer, with three activation modes
- **IndexBuffer**: One typed index stream over an index buffer

Per frame: mutate source bytes, mark them dirty, call
`BufferManager::flush_pending()`, then activate and draw.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod graphics_device;
pub mod buffer;
pub mod vertex;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine init guard and logger slot
    pub use crate::engine::Engine;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    // Driver seam: GraphicsDevice trait, handles, capabilities and type tables
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Buffer core, manager and pool
    pub mod buffer {
        pub use crate::buffer::*;
    }

    // Vertex and index buffers
    pub mod vertex {
        pub use crate::vertex::*;
    }
}
