/// GraphicsDevice trait - the driver calls the buffer layer is built on
///
/// One device corresponds to one GPU context. Buffer storage calls take an
/// explicit handle; draw-time calls (`bind_buffer`, attribute pointers,
/// vertex arrays, draws) act on the context's current binding state.

use std::sync::{Arc, Mutex, MutexGuard};
use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::graphics_device::types::VertexAttribute;

// ============================================================================
// Handles
// ============================================================================

/// Driver buffer object name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Driver vertex array object name (a recorded binding sequence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

// ============================================================================
// Buffer enums and flags
// ============================================================================

/// Binding point a buffer is created for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data
    Vertex,
    /// Index (element) data
    Index,
    /// Any other data (uniforms, pixel transfers, ...)
    Generic,
}

/// Usage hint passed to the driver when storage is allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    StreamDraw,
    StreamRead,
    StreamCopy,
    StaticDraw,
    StaticRead,
    StaticCopy,
    DynamicDraw,
    DynamicRead,
    DynamicCopy,
}

bitflags! {
    /// Access flags for buffer mapping
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapFlags: u32 {
        /// Mapped memory is read by the CPU
        const READ = 1 << 0;
        /// Mapped memory is written by the CPU
        const WRITE = 1 << 1;
        /// Written sub-ranges are published with `flush_mapped_range`
        const FLUSH_EXPLICIT = 1 << 2;
    }
}

bitflags! {
    /// Optional driver features the buffer layer adapts to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceFeatures: u32 {
        /// Sub-range mapping with explicit flush
        const MAP_BUFFER_RANGE = 1 << 0;
        /// GPU-side buffer objects
        const VERTEX_BUFFER_OBJECT = 1 << 1;
        /// Vertex array objects (pre-baked binding sequences)
        const VERTEX_ARRAY_OBJECT = 1 << 2;
        /// Instanced draw calls
        const HW_INSTANCING = 1 << 3;
    }
}

/// Capabilities reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub features: DeviceFeatures,
    /// Number of generic vertex attribute slots
    pub max_vertex_attributes: u32,
    /// Number of texture coordinate sets
    pub max_texture_coords: u32,
}

impl DeviceCapabilities {
    pub fn supports(&self, features: DeviceFeatures) -> bool {
        self.features.contains(features)
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            features: DeviceFeatures::VERTEX_BUFFER_OBJECT,
            max_vertex_attributes: 16,
            max_texture_coords: 8,
        }
    }
}

// ============================================================================
// Draw-time descriptors
// ============================================================================

/// Where an attribute or index stream reads from
#[derive(Debug, Clone, Copy)]
pub enum DataSource<'a> {
    /// CPU memory, starting at the first element
    Client(&'a [u8]),
    /// Byte offset into the buffer bound to the matching target
    Offset(u64),
}

/// One attribute pointer call
#[derive(Debug, Clone, Copy)]
pub struct AttributePointer<'a> {
    pub attribute: VertexAttribute,
    /// Driver scalar type code
    pub scalar_type: u32,
    /// Component count (1-4)
    pub components: u8,
    /// Byte distance between consecutive elements
    pub stride: u32,
    pub source: DataSource<'a>,
}

// ============================================================================
// GraphicsDevice trait
// ============================================================================

/// Driver entry points consumed by the buffer layer
pub trait GraphicsDevice: Send + Sync {
    /// Capabilities of this context
    fn capabilities(&self) -> DeviceCapabilities;

    // ===== BUFFER OBJECTS =====

    /// Create a buffer object with no storage
    fn create_buffer(&mut self) -> Result<BufferHandle>;

    /// Delete a buffer object and its storage
    fn delete_buffer(&mut self, handle: BufferHandle);

    /// (Re)allocate the storage of a buffer, optionally filled with `data`
    fn buffer_storage(
        &mut self,
        handle: BufferHandle,
        target: BufferTarget,
        size: u64,
        data: Option<&[u8]>,
        usage: BufferUsage,
    ) -> Result<()>;

    /// Upload `data` at `offset` without mapping
    fn buffer_sub_data(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// Storage size reported by the driver (0 for unknown handles)
    fn buffer_size(&self, handle: BufferHandle) -> u64;

    // ===== MAPPING =====

    /// Map the whole buffer
    fn map_buffer(&mut self, handle: BufferHandle, access: MapFlags) -> Result<&mut [u8]>;

    /// Map `[offset, offset + length)`
    fn map_buffer_range(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        length: u64,
        access: MapFlags,
    ) -> Result<&mut [u8]>;

    /// Publish a written sub-range, relative to the start of the mapped range
    fn flush_mapped_range(&mut self, handle: BufferHandle, offset: u64, length: u64);

    /// End the current mapping
    fn unmap_buffer(&mut self, handle: BufferHandle) -> Result<()>;

    // ===== DRAW-TIME BINDING =====

    /// Bind (or unbind with `None`) a buffer to a target
    fn bind_buffer(&mut self, target: BufferTarget, handle: Option<BufferHandle>);

    fn enable_attribute(&mut self, attribute: VertexAttribute);

    fn disable_attribute(&mut self, attribute: VertexAttribute);

    fn attribute_pointer(&mut self, pointer: &AttributePointer<'_>);

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle>;

    fn bind_vertex_array(&mut self, handle: Option<VertexArrayHandle>);

    fn delete_vertex_array(&mut self, handle: VertexArrayHandle);

    // ===== DRAWS =====

    /// Non-indexed draw; `instances == 1` is a plain draw
    fn draw_arrays(&mut self, primitive: u32, first: u32, count: u32, instances: u32);

    /// Indexed draw; `instances == 1` is a plain draw
    fn draw_elements(
        &mut self,
        primitive: u32,
        count: u32,
        index_type: u32,
        indices: DataSource<'_>,
        instances: u32,
    );
}

/// Lock a shared device, mapping poisoning to `Error::BackendError`
pub fn lock_device(
    device: &Arc<Mutex<dyn GraphicsDevice>>,
) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
    device.lock().map_err(|_| {
        crate::engine_error!("galaxy3d::GraphicsDevice", "GraphicsDevice lock poisoned");
        Error::BackendError("GraphicsDevice lock poisoned".to_string())
    })
}
