/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Records every call as a `DeviceCall`, keeps a byte vector per buffer so
/// uploads can be checked byte-for-byte, and can be told to fail the next
/// creation, allocation, map or unmap.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AttributePointer, BufferHandle, BufferTarget, BufferUsage, DataSource, DeviceCapabilities,
    DeviceFeatures, GraphicsDevice, MapFlags, VertexArrayHandle, VertexAttribute,
};

/// GL_INVALID_OPERATION
pub const INVALID_OPERATION: u32 = 0x0502;
/// GL_OUT_OF_MEMORY
pub const OUT_OF_MEMORY: u32 = 0x0505;

// ============================================================================
// Recorded calls
// ============================================================================

/// Data source as recorded by the mock (client memory by address)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedSource {
    Client { address: usize, len: usize },
    Offset(u64),
}

impl From<DataSource<'_>> for RecordedSource {
    fn from(source: DataSource<'_>) -> Self {
        match source {
            DataSource::Client(bytes) => RecordedSource::Client {
                address: bytes.as_ptr() as usize,
                len: bytes.len(),
            },
            DataSource::Offset(offset) => RecordedSource::Offset(offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    CreateBuffer(BufferHandle),
    DeleteBuffer(BufferHandle),
    BufferStorage { handle: BufferHandle, target: BufferTarget, size: u64, with_data: bool, usage: BufferUsage },
    BufferSubData { handle: BufferHandle, offset: u64, len: u64 },
    MapBuffer { handle: BufferHandle, access: MapFlags },
    MapBufferRange { handle: BufferHandle, offset: u64, length: u64, access: MapFlags },
    FlushMappedRange { handle: BufferHandle, offset: u64, length: u64 },
    UnmapBuffer(BufferHandle),
    BindBuffer { target: BufferTarget, handle: Option<BufferHandle> },
    EnableAttribute(VertexAttribute),
    DisableAttribute(VertexAttribute),
    AttributePointer { attribute: VertexAttribute, scalar_type: u32, components: u8, stride: u32, source: RecordedSource },
    CreateVertexArray(VertexArrayHandle),
    BindVertexArray(Option<VertexArrayHandle>),
    DeleteVertexArray(VertexArrayHandle),
    DrawArrays { primitive: u32, first: u32, count: u32, instances: u32 },
    DrawElements { primitive: u32, count: u32, index_type: u32, indices: RecordedSource, instances: u32 },
}

impl DeviceCall {
    /// True for calls that touch buffer storage (allocation, upload, mapping)
    pub fn is_upload(&self) -> bool {
        matches!(
            self,
            DeviceCall::BufferStorage { .. }
                | DeviceCall::BufferSubData { .. }
                | DeviceCall::MapBuffer { .. }
                | DeviceCall::MapBufferRange { .. }
                | DeviceCall::FlushMappedRange { .. }
                | DeviceCall::UnmapBuffer(_)
        )
    }
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockGraphicsDevice {
    pub capabilities: DeviceCapabilities,
    pub calls: Vec<DeviceCall>,
    storage: FxHashMap<BufferHandle, Vec<u8>>,
    mapped: Option<BufferHandle>,
    next_buffer: u32,
    next_vertex_array: u32,
    live_vertex_arrays: Vec<VertexArrayHandle>,
    fail_next_create: bool,
    fail_next_storage: bool,
    fail_next_map: Option<u32>,
    fail_next_unmap: bool,
}

impl MockGraphicsDevice {
    /// Device with every feature
    pub fn new() -> Self {
        Self::with_features(DeviceFeatures::all())
    }

    pub fn with_features(features: DeviceFeatures) -> Self {
        Self {
            capabilities: DeviceCapabilities {
                features,
                max_vertex_attributes: 16,
                max_texture_coords: 8,
            },
            calls: Vec::new(),
            storage: FxHashMap::default(),
            mapped: None,
            next_buffer: 1,
            next_vertex_array: 1,
            live_vertex_arrays: Vec::new(),
            fail_next_create: false,
            fail_next_storage: false,
            fail_next_map: None,
            fail_next_unmap: false,
        }
    }

    // ===== FAILURE INJECTION =====

    pub fn fail_next_create(&mut self) {
        self.fail_next_create = true;
    }

    pub fn fail_next_storage(&mut self) {
        self.fail_next_storage = true;
    }

    /// Next map call fails with the given driver code
    pub fn fail_next_map(&mut self, code: u32) {
        self.fail_next_map = Some(code);
    }

    pub fn fail_next_unmap(&mut self) {
        self.fail_next_unmap = true;
    }

    // ===== INSPECTION =====

    /// Current content of a buffer
    pub fn contents(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.storage.get(&handle).map(|bytes| bytes.as_slice())
    }

    /// Overwrite the storage of a buffer without recording a call
    pub fn poke(&mut self, handle: BufferHandle, offset: usize, bytes: &[u8]) {
        if let Some(storage) = self.storage.get_mut(&handle) {
            storage[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
    }

    pub fn live_buffers(&self) -> usize {
        self.storage.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.live_vertex_arrays.len()
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    pub fn upload_calls(&self) -> Vec<DeviceCall> {
        self.calls.iter().filter(|c| c.is_upload()).cloned().collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_buffer(&mut self) -> Result<BufferHandle> {
        if std::mem::take(&mut self.fail_next_create) {
            return Err(Error::OutOfMemory);
        }
        let handle = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        self.storage.insert(handle, Vec::new());
        self.calls.push(DeviceCall::CreateBuffer(handle));
        Ok(handle)
    }

    fn delete_buffer(&mut self, handle: BufferHandle) {
        self.storage.remove(&handle);
        if self.mapped == Some(handle) {
            self.mapped = None;
        }
        self.calls.push(DeviceCall::DeleteBuffer(handle));
    }

    fn buffer_storage(
        &mut self,
        handle: BufferHandle,
        target: BufferTarget,
        size: u64,
        data: Option<&[u8]>,
        usage: BufferUsage,
    ) -> Result<()> {
        self.calls.push(DeviceCall::BufferStorage { handle, target, size, with_data: data.is_some(), usage });
        if std::mem::take(&mut self.fail_next_storage) {
            return Err(Error::DriverError { code: OUT_OF_MEMORY, message: "buffer_storage".to_string() });
        }
        let storage = self.storage.get_mut(&handle).ok_or_else(|| Error::DriverError {
            code: INVALID_OPERATION,
            message: "buffer_storage on unknown buffer".to_string(),
        })?;
        let mut bytes = vec![0u8; size as usize];
        if let Some(data) = data {
            let len = data.len().min(bytes.len());
            bytes[..len].copy_from_slice(&data[..len]);
        }
        *storage = bytes;
        Ok(())
    }

    fn buffer_sub_data(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.calls.push(DeviceCall::BufferSubData { handle, offset, len: data.len() as u64 });
        let storage = self.storage.get_mut(&handle).ok_or_else(|| Error::DriverError {
            code: INVALID_OPERATION,
            message: "buffer_sub_data on unknown buffer".to_string(),
        })?;
        let start = offset as usize;
        let end = start + data.len();
        if end > storage.len() {
            return Err(Error::DriverError { code: INVALID_OPERATION, message: "buffer_sub_data out of range".to_string() });
        }
        storage[start..end].copy_from_slice(data);
        Ok(())
    }

    fn buffer_size(&self, handle: BufferHandle) -> u64 {
        self.storage.get(&handle).map(|bytes| bytes.len() as u64).unwrap_or(0)
    }

    fn map_buffer(&mut self, handle: BufferHandle, access: MapFlags) -> Result<&mut [u8]> {
        self.calls.push(DeviceCall::MapBuffer { handle, access });
        if let Some(code) = self.fail_next_map.take() {
            return Err(Error::DriverError { code, message: "map_buffer".to_string() });
        }
        if self.mapped.is_some() {
            return Err(Error::DriverError { code: INVALID_OPERATION, message: "buffer already mapped".to_string() });
        }
        let storage = self.storage.get_mut(&handle).ok_or_else(|| Error::DriverError {
            code: INVALID_OPERATION,
            message: "map_buffer on unknown buffer".to_string(),
        })?;
        self.mapped = Some(handle);
        Ok(storage.as_mut_slice())
    }

    fn map_buffer_range(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        length: u64,
        access: MapFlags,
    ) -> Result<&mut [u8]> {
        self.calls.push(DeviceCall::MapBufferRange { handle, offset, length, access });
        if let Some(code) = self.fail_next_map.take() {
            return Err(Error::DriverError { code, message: "map_buffer_range".to_string() });
        }
        if self.mapped.is_some() {
            return Err(Error::DriverError { code: INVALID_OPERATION, message: "buffer already mapped".to_string() });
        }
        let storage = self.storage.get_mut(&handle).ok_or_else(|| Error::DriverError {
            code: INVALID_OPERATION,
            message: "map_buffer_range on unknown buffer".to_string(),
        })?;
        let start = offset as usize;
        let end = start + length as usize;
        if end > storage.len() {
            return Err(Error::DriverError { code: INVALID_OPERATION, message: "map range out of bounds".to_string() });
        }
        self.mapped = Some(handle);
        Ok(&mut storage[start..end])
    }

    fn flush_mapped_range(&mut self, handle: BufferHandle, offset: u64, length: u64) {
        self.calls.push(DeviceCall::FlushMappedRange { handle, offset, length });
    }

    fn unmap_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        self.calls.push(DeviceCall::UnmapBuffer(handle));
        self.mapped = None;
        if std::mem::take(&mut self.fail_next_unmap) {
            return Err(Error::DriverError { code: INVALID_OPERATION, message: "unmap_buffer".to_string() });
        }
        Ok(())
    }

    fn bind_buffer(&mut self, target: BufferTarget, handle: Option<BufferHandle>) {
        self.calls.push(DeviceCall::BindBuffer { target, handle });
    }

    fn enable_attribute(&mut self, attribute: VertexAttribute) {
        self.calls.push(DeviceCall::EnableAttribute(attribute));
    }

    fn disable_attribute(&mut self, attribute: VertexAttribute) {
        self.calls.push(DeviceCall::DisableAttribute(attribute));
    }

    fn attribute_pointer(&mut self, pointer: &AttributePointer<'_>) {
        self.calls.push(DeviceCall::AttributePointer {
            attribute: pointer.attribute,
            scalar_type: pointer.scalar_type,
            components: pointer.components,
            stride: pointer.stride,
            source: pointer.source.into(),
        });
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle> {
        if std::mem::take(&mut self.fail_next_create) {
            return Err(Error::OutOfMemory);
        }
        let handle = VertexArrayHandle(self.next_vertex_array);
        self.next_vertex_array += 1;
        self.live_vertex_arrays.push(handle);
        self.calls.push(DeviceCall::CreateVertexArray(handle));
        Ok(handle)
    }

    fn bind_vertex_array(&mut self, handle: Option<VertexArrayHandle>) {
        self.calls.push(DeviceCall::BindVertexArray(handle));
    }

    fn delete_vertex_array(&mut self, handle: VertexArrayHandle) {
        self.live_vertex_arrays.retain(|h| *h != handle);
        self.calls.push(DeviceCall::DeleteVertexArray(handle));
    }

    fn draw_arrays(&mut self, primitive: u32, first: u32, count: u32, instances: u32) {
        self.calls.push(DeviceCall::DrawArrays { primitive, first, count, instances });
    }

    fn draw_elements(
        &mut self,
        primitive: u32,
        count: u32,
        index_type: u32,
        indices: DataSource<'_>,
        instances: u32,
    ) {
        self.calls.push(DeviceCall::DrawElements {
            primitive,
            count,
            index_type,
            indices: indices.into(),
            instances,
        });
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
