/// VertexBuffer - vertex blocks laid out over one vertex-target buffer
///
/// Each block is a `VertexBufferData` layout plus the `BufferData` holding
/// its bytes. At draw time the buffer is activated in one of three ways:
///
/// - `ClientArrays`: attribute pointers address the CPU copy directly
/// - `BoundBuffer`: the GPU buffer is bound once, pointers are byte offsets
/// - `PreBaked`: the bound-buffer sequence is recorded once into a vertex
///   array object and replayed with a single call
///
/// # Example
///
/// ```ignore
/// use galaxy_3d_buffers::galaxy3d::device::{BufferUsage, PrimitiveType, ScalarType, VertexAttribute};
/// use galaxy_3d_buffers::galaxy3d::vertex::{AttributeStream, RenderMode, VertexBuffer, VertexBufferData};
///
/// let mut layout = VertexBufferData::new();
/// layout.add_data_array(AttributeStream::new(VertexAttribute::Position, ScalarType::F32, 3), 3);
///
/// let mut vertices = VertexBuffer::new(&mut manager);
/// let block = vertices.add_data(&mut manager, layout)?;
/// vertices.write_stream(&mut manager, block, 0, &[[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])?;
/// vertices.build(&mut manager, BufferUsage::StaticDraw, RenderMode::PreBaked)?;
///
/// vertices.use_buffer(&mut manager)?;
/// vertices.render(&manager, PrimitiveType::Triangles)?;
/// vertices.finish_render(&mut manager)?;
/// # Ok::<(), galaxy_3d_buffers::galaxy3d::Error>(())
/// ```

use std::ops::Range;
use bytemuck::Pod;
use crate::buffer::{BufferData, BufferDataKey, BufferKey, BufferManager};
use crate::error::{Error, Result};
use crate::graphics_device::{
    lock_device, AttributePointer, BufferTarget, BufferUsage, DataSource, DeviceCapabilities, DeviceFeatures,
    PrimitiveType, VertexArrayHandle, VertexAttribute,
};
use crate::vertex::VertexBufferData;

const SOURCE: &str = "galaxy3d::VertexBuffer";

/// How attribute streams are activated at draw time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    ClientArrays,
    BoundBuffer,
    PreBaked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    Unbuilt,
    ClientArrays,
    BoundBuffer,
    PreBaked { sequence: VertexArrayHandle },
}

impl Activation {
    fn mode(self) -> Option<RenderMode> {
        match self {
            Activation::Unbuilt => None,
            Activation::ClientArrays => Some(RenderMode::ClientArrays),
            Activation::BoundBuffer => Some(RenderMode::BoundBuffer),
            Activation::PreBaked { .. } => Some(RenderMode::PreBaked),
        }
    }
}

struct VertexBlock {
    data: BufferDataKey,
    layout: VertexBufferData,
}

/// Owned description of one attribute pointer call
struct StreamPointer {
    attribute: VertexAttribute,
    scalar_type: u32,
    components: u8,
    stride: u32,
    data: BufferDataKey,
    offset: u64,
}

pub struct VertexBuffer {
    buffer: BufferKey,
    blocks: Vec<VertexBlock>,
    /// Caller override, never above the smallest block
    vertex_count: Option<u32>,
    activation: Activation,
}

impl VertexBuffer {
    /// Empty vertex buffer backed by a new vertex-target buffer of `manager`
    pub fn new(manager: &mut BufferManager) -> Self {
        Self {
            buffer: manager.create_buffer(BufferTarget::Vertex),
            blocks: Vec::new(),
            vertex_count: None,
            activation: Activation::Unbuilt,
        }
    }

    // ===== ACCESSORS =====

    /// Key of the underlying buffer in its manager
    pub fn buffer(&self) -> BufferKey {
        self.buffer
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_layout(&self, block: usize) -> Option<&VertexBufferData> {
        self.blocks.get(block).map(|b| &b.layout)
    }

    /// Key of the bytes of one block
    pub fn block_data(&self, block: usize) -> Option<BufferDataKey> {
        self.blocks.get(block).map(|b| b.data)
    }

    /// Vertices drawn by `render`
    pub fn vertex_count(&self) -> u32 {
        let available = self.blocks.iter().map(|b| b.layout.vertex_count()).min().unwrap_or(0);
        self.vertex_count.map_or(available, |count| count.min(available))
    }

    /// Draw fewer vertices than the blocks hold
    pub fn set_vertex_count(&mut self, count: u32) {
        let available = self.blocks.iter().map(|b| b.layout.vertex_count()).min().unwrap_or(0);
        if count > available {
            crate::engine_warn!(SOURCE, "Vertex count {} exceeds the {} vertices stored, clamping", count, available);
        }
        self.vertex_count = Some(count.min(available));
    }

    pub fn render_mode(&self) -> Option<RenderMode> {
        self.activation.mode()
    }

    pub fn is_built(&self) -> bool {
        self.activation != Activation::Unbuilt
    }

    /// Bytes of every block
    pub fn size(&self, manager: &BufferManager) -> u64 {
        manager.buffer(self.buffer).map_or(0, |b| b.total_size())
    }

    /// Bytes of GPU storage currently allocated
    pub fn used_vram(&self, manager: &BufferManager) -> u64 {
        manager
            .buffer(self.buffer)
            .filter(|b| b.is_built())
            .map_or(0, |b| b.allocated_size())
    }

    // ===== LAYOUT =====

    /// Append a block with zeroed bytes owned by the buffer
    pub fn add_data(&mut self, manager: &mut BufferManager, layout: VertexBufferData) -> Result<usize> {
        let bytes = vec![0u8; layout.size() as usize];
        self.push_block(manager, layout, BufferData::engine_owned(bytes))
    }

    /// Append a block over caller bytes, handed back by `destroy`
    pub fn add_data_with_bytes(
        &mut self,
        manager: &mut BufferManager,
        layout: VertexBufferData,
        bytes: Vec<u8>,
    ) -> Result<usize> {
        if bytes.len() as u64 != layout.size() {
            return Err(invalid_resource(format!(
                "Vertex block needs {} bytes, got {}",
                layout.size(),
                bytes.len()
            )));
        }
        self.push_block(manager, layout, BufferData::new(bytes))
    }

    fn push_block(&mut self, manager: &mut BufferManager, mut layout: VertexBufferData, data: BufferData) -> Result<usize> {
        debug_assert!(!self.is_built(), "vertex data added after build");
        if self.is_built() {
            return Err(invalid_resource("Vertex data added after build".to_string()));
        }

        let capabilities = *manager.capabilities();
        for stream in layout.streams_mut() {
            *stream = stream.with_attribute(stream.attribute().clamp_to(&capabilities));
        }

        let data = manager.attach(self.buffer, data)?;
        self.blocks.push(VertexBlock { data, layout });
        Ok(self.blocks.len() - 1)
    }

    // ===== BUILD / MODE =====

    /// Allocate and upload the GPU buffer, then prepare `mode`
    ///
    /// Building again discards a recorded sequence and records a new one.
    /// When the sequence cannot be recorded the buffer stays usable in
    /// bound-buffer mode and the error is returned.
    pub fn build(&mut self, manager: &mut BufferManager, usage: BufferUsage, mode: RenderMode) -> Result<()> {
        manager.build(self.buffer, usage)?;
        self.release_sequence(manager)?;
        self.activate(manager, mode)
    }

    /// Switch the activation strategy, building first when needed
    pub fn set_render_mode(&mut self, manager: &mut BufferManager, mode: RenderMode) -> Result<()> {
        if !self.is_built() {
            let usage = manager.buffer(self.buffer).map_or(BufferUsage::StreamDraw, |b| b.usage());
            return self.build(manager, usage, mode);
        }
        if self.render_mode() == Some(supported_mode(manager.capabilities(), mode)) {
            return Ok(());
        }
        self.release_sequence(manager)?;
        self.activate(manager, mode)
    }

    fn activate(&mut self, manager: &mut BufferManager, requested: RenderMode) -> Result<()> {
        let mode = supported_mode(manager.capabilities(), requested);
        if mode != requested {
            crate::engine_warn!(
                SOURCE,
                "{:?} mode not supported by device, using {:?} mode for {:?}",
                requested,
                mode,
                self.buffer
            );
        }
        self.activation = match mode {
            RenderMode::ClientArrays => Activation::ClientArrays,
            RenderMode::BoundBuffer => Activation::BoundBuffer,
            RenderMode::PreBaked => match self.record_sequence(manager) {
                Ok(sequence) => Activation::PreBaked { sequence },
                Err(err) => {
                    self.activation = Activation::BoundBuffer;
                    return Err(err);
                }
            },
        };
        crate::engine_debug!(SOURCE, "{:?} ready in {:?} mode", self.buffer, mode);
        Ok(())
    }

    fn release_sequence(&mut self, manager: &mut BufferManager) -> Result<()> {
        if let Activation::PreBaked { sequence } = self.activation {
            self.activation = Activation::BoundBuffer;
            manager.delete_sequence(sequence)?;
        }
        Ok(())
    }

    fn record_sequence(&self, manager: &mut BufferManager) -> Result<VertexArrayHandle> {
        let Some(handle) = manager.buffer(self.buffer).and_then(|b| b.handle()) else {
            return Err(invalid_resource(format!("{:?} has no GPU buffer to record", self.buffer)));
        };
        let pointers = self.stream_pointers(manager);

        let sequence = {
            let mut device = lock_device(manager.device())?;
            let sequence = device.create_vertex_array().map_err(|err| {
                crate::engine_error!(SOURCE, "Failed to create vertex array: {}", err);
                err
            })?;
            device.bind_vertex_array(Some(sequence));
            device.bind_buffer(BufferTarget::Vertex, Some(handle));
            for pointer in &pointers {
                let first = manager.data(pointer.data).map_or(0, |d| d.first());
                device.enable_attribute(pointer.attribute);
                device.attribute_pointer(&pointer.to_call(DataSource::Offset(first + pointer.offset)));
            }
            device.bind_vertex_array(None);
            device.bind_buffer(BufferTarget::Vertex, None);
            sequence
        };

        manager.track_sequence(sequence);
        crate::engine_trace!(SOURCE, "Recorded {:?} with {} streams", sequence, pointers.len());
        Ok(sequence)
    }

    // ===== DRAW-TIME =====

    /// Activate the streams for the next draws
    pub fn use_buffer(&self, manager: &mut BufferManager) -> Result<()> {
        match self.activation {
            Activation::Unbuilt => Err(invalid_resource(format!("{:?} is not built", self.buffer))),
            Activation::ClientArrays => self.bind_streams(manager, false),
            Activation::BoundBuffer => {
                manager.use_buffer(self.buffer)?;
                self.bind_streams(manager, true)
            }
            Activation::PreBaked { sequence } => {
                lock_device(manager.device())?.bind_vertex_array(Some(sequence));
                manager.draw_state_mut().bind_sequence(sequence);
                Ok(())
            }
        }
    }

    fn bind_streams(&self, manager: &mut BufferManager, bound: bool) -> Result<()> {
        let pointers = self.stream_pointers(manager);
        let fresh: Vec<bool> = pointers
            .iter()
            .map(|pointer| manager.draw_state_mut().enable(pointer.attribute))
            .collect();

        let mut device = lock_device(manager.device())?;
        for (pointer, fresh) in pointers.iter().zip(fresh) {
            let Some(data) = manager.data(pointer.data) else {
                continue;
            };
            if fresh {
                device.enable_attribute(pointer.attribute);
            }
            let source = if bound {
                DataSource::Offset(data.first() + pointer.offset)
            } else {
                // Empty blocks place later streams past the end of their bytes
                DataSource::Client(data.bytes().get(pointer.offset as usize..).unwrap_or(&[]))
            };
            device.attribute_pointer(&pointer.to_call(source));
        }
        Ok(())
    }

    fn stream_pointers(&self, manager: &BufferManager) -> Vec<StreamPointer> {
        let types = manager.type_table();
        self.blocks
            .iter()
            .flat_map(move |block| {
                block.layout.streams().iter().map(move |stream| StreamPointer {
                    attribute: stream.attribute(),
                    scalar_type: types.scalar_code(stream.scalar_type()),
                    components: stream.components(),
                    stride: block.layout.stream_stride(stream),
                    data: block.data,
                    offset: stream.offset(),
                })
            })
            .collect()
    }

    /// Draw `vertex_count()` vertices
    pub fn render(&self, manager: &BufferManager, primitive: PrimitiveType) -> Result<()> {
        self.draw(manager, primitive, 1)
    }

    /// Draw `instances` copies; the device must support hardware instancing
    pub fn render_instanced(&self, manager: &BufferManager, primitive: PrimitiveType, instances: u32) -> Result<()> {
        if !manager.capabilities().supports(DeviceFeatures::HW_INSTANCING) {
            crate::engine_bail!(SOURCE, "Instanced draw requested but the device has no hardware instancing");
        }
        self.draw(manager, primitive, instances)
    }

    fn draw(&self, manager: &BufferManager, primitive: PrimitiveType, instances: u32) -> Result<()> {
        if !self.is_built() {
            return Err(invalid_resource(format!("{:?} drawn before build", self.buffer)));
        }
        let code = manager.primitive_code(primitive);
        lock_device(manager.device())?.draw_arrays(code, 0, self.vertex_count(), instances);
        Ok(())
    }

    /// Undo what `use_buffer` enabled and bound
    pub fn finish_render(&self, manager: &mut BufferManager) -> Result<()> {
        manager.finish_render()
    }

    // ===== UPDATES =====

    /// Mark vertices `range` of one block for the next flush
    pub fn mark_vertices_dirty(&self, manager: &mut BufferManager, block: usize, range: Range<u32>) -> Result<()> {
        let block = self.block(block)?;
        for bytes in block.layout.vertex_byte_ranges(range) {
            manager.mark_dirty(block.data, Some(bytes))?;
        }
        Ok(())
    }

    /// Mark every block for the next flush
    pub fn mark_all_dirty(&self, manager: &mut BufferManager) -> Result<()> {
        manager.mark_buffer_dirty(self.buffer, None)
    }

    /// Fill stream `stream` of `block` from typed elements and mark them dirty
    pub fn write_stream<T: Pod>(
        &self,
        manager: &mut BufferManager,
        block: usize,
        stream: usize,
        values: &[T],
    ) -> Result<()> {
        let block = self.block(block)?;
        let data = manager.data_mut(block.data)?;
        let touched = block.layout.write_stream(data.bytes_mut(), stream, values)?;
        if touched.is_empty() {
            return Ok(());
        }
        manager.mark_dirty(block.data, Some(touched))
    }

    /// Copy `bytes` at `offset` of a block and upload them now
    pub fn write_immediate(&self, manager: &mut BufferManager, block: usize, offset: u64, bytes: &[u8]) -> Result<()> {
        let block = self.block(block)?;
        manager.write_immediate(block.data, offset, bytes)
    }

    fn block(&self, block: usize) -> Result<&VertexBlock> {
        self.blocks
            .get(block)
            .ok_or_else(|| invalid_resource(format!("Vertex block {} out of range ({} blocks)", block, self.blocks.len())))
    }

    /// Release GPU objects; caller-owned blocks are handed back
    pub fn destroy(mut self, manager: &mut BufferManager) -> Result<Vec<BufferData>> {
        self.release_sequence(manager)?;
        manager.destroy_buffer(self.buffer)
    }
}

impl StreamPointer {
    fn to_call<'a>(&self, source: DataSource<'a>) -> AttributePointer<'a> {
        AttributePointer {
            attribute: self.attribute,
            scalar_type: self.scalar_type,
            components: self.components,
            stride: self.stride,
            source,
        }
    }
}

/// Closest mode the device can run: pre-baked needs vertex arrays and
/// buffer objects, bound-buffer needs buffer objects
fn supported_mode(capabilities: &DeviceCapabilities, requested: RenderMode) -> RenderMode {
    let buffers = capabilities.supports(DeviceFeatures::VERTEX_BUFFER_OBJECT);
    let sequences = buffers && capabilities.supports(DeviceFeatures::VERTEX_ARRAY_OBJECT);
    match requested {
        RenderMode::PreBaked if sequences => RenderMode::PreBaked,
        RenderMode::PreBaked | RenderMode::BoundBuffer if buffers => RenderMode::BoundBuffer,
        _ => RenderMode::ClientArrays,
    }
}

fn invalid_resource(message: String) -> Error {
    crate::engine_error!(SOURCE, "{}", message);
    Error::InvalidResource(message)
}

#[cfg(test)]
#[path = "vertex_buffer_tests.rs"]
mod tests;
