/// IndexBuffer - one typed index stream over an index-target buffer
///
/// Before `build` the indices are drawn from CPU memory; afterwards the draw
/// reads them from the buffer bound to the index target.

use std::ops::Range;
use bytemuck::Pod;
use crate::buffer::{BufferData, BufferDataKey, BufferKey, BufferManager, DataOwnership};
use crate::error::{Error, Result};
use crate::graphics_device::{lock_device, BufferTarget, BufferUsage, DataSource, DeviceFeatures, PrimitiveType, ScalarType};

const SOURCE: &str = "galaxy3d::IndexBuffer";

/// Width of one index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    U8,
    #[default]
    U16,
    U32,
}

impl IndexType {
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U8 => 1,
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }

    /// Scalar type used for the driver code lookup
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            IndexType::U8 => ScalarType::U8,
            IndexType::U16 => ScalarType::U16,
            IndexType::U32 => ScalarType::U32,
        }
    }
}

/// Rust integer types usable as indices
pub trait IndexElement: Pod {
    const INDEX_TYPE: IndexType;
}

impl IndexElement for u8 {
    const INDEX_TYPE: IndexType = IndexType::U8;
}

impl IndexElement for u16 {
    const INDEX_TYPE: IndexType = IndexType::U16;
}

impl IndexElement for u32 {
    const INDEX_TYPE: IndexType = IndexType::U32;
}

pub struct IndexBuffer {
    buffer: BufferKey,
    data: Option<BufferDataKey>,
    index_type: IndexType,
    index_count: u32,
}

impl IndexBuffer {
    pub fn new(manager: &mut BufferManager) -> Self {
        Self {
            buffer: manager.create_buffer(BufferTarget::Index),
            data: None,
            index_type: IndexType::default(),
            index_count: 0,
        }
    }

    // ===== ACCESSORS =====

    pub fn buffer(&self) -> BufferKey {
        self.buffer
    }

    pub fn data(&self) -> Option<BufferDataKey> {
        self.data
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn is_built(&self, manager: &BufferManager) -> bool {
        manager.buffer(self.buffer).is_some_and(|b| b.is_built())
    }

    pub fn size(&self, manager: &BufferManager) -> u64 {
        manager.buffer(self.buffer).map_or(0, |b| b.total_size())
    }

    pub fn used_vram(&self, manager: &BufferManager) -> u64 {
        manager
            .buffer(self.buffer)
            .filter(|b| b.is_built())
            .map_or(0, |b| b.allocated_size())
    }

    // ===== INDICES =====

    /// Use caller bytes holding `index_count` indices of `index_type`
    ///
    /// Returns the previous indices when they were caller-owned.
    pub fn set_indices(
        &mut self,
        manager: &mut BufferManager,
        index_type: IndexType,
        bytes: Vec<u8>,
        index_count: u32,
    ) -> Result<Option<BufferData>> {
        let expected = u64::from(index_count) * u64::from(index_type.size_bytes());
        if bytes.len() as u64 != expected {
            return Err(invalid_resource(format!(
                "{} {:?} indices need {} bytes, got {}",
                index_count,
                index_type,
                expected,
                bytes.len()
            )));
        }
        self.replace(manager, index_type, index_count, BufferData::new(bytes))
    }

    /// Copy typed indices into bytes owned by the buffer
    pub fn set_typed_indices<T: IndexElement>(
        &mut self,
        manager: &mut BufferManager,
        indices: &[T],
    ) -> Result<Option<BufferData>> {
        let index_count = index_count_of(indices.len())?;
        let bytes = bytemuck::cast_slice(indices).to_vec();
        self.replace(manager, T::INDEX_TYPE, index_count, BufferData::engine_owned(bytes))
    }

    fn replace(
        &mut self,
        manager: &mut BufferManager,
        index_type: IndexType,
        index_count: u32,
        data: BufferData,
    ) -> Result<Option<BufferData>> {
        debug_assert!(!self.is_built(manager), "indices replaced after build");
        if self.is_built(manager) {
            return Err(invalid_resource("Indices replaced after build".to_string()));
        }

        let previous = match self.data.take() {
            Some(key) => Some(manager.detach(key)?),
            None => None,
        };
        self.data = Some(manager.attach(self.buffer, data)?);
        self.index_type = index_type;
        self.index_count = index_count;
        Ok(previous.filter(|d| d.ownership() == DataOwnership::Caller))
    }

    // ===== GPU STORAGE =====

    pub fn build(&mut self, manager: &mut BufferManager, usage: BufferUsage) -> Result<()> {
        if self.data.is_none() {
            return Err(invalid_resource(format!("{:?} built without indices", self.buffer)));
        }
        manager.build(self.buffer, usage)
    }

    /// Mark indices `range` for the next flush
    pub fn mark_indices_dirty(&self, manager: &mut BufferManager, range: Range<u32>) -> Result<()> {
        let data = self.indices_key()?;
        let size = u64::from(self.index_type.size_bytes());
        let start = u64::from(range.start.min(self.index_count));
        let end = u64::from(range.end.min(self.index_count));
        manager.mark_dirty(data, Some(start * size..end * size))
    }

    /// Overwrite indices from `first` and upload them now
    pub fn write_immediate<T: IndexElement>(
        &self,
        manager: &mut BufferManager,
        first: u32,
        indices: &[T],
    ) -> Result<()> {
        if T::INDEX_TYPE != self.index_type {
            crate::engine_bail!(
                SOURCE,
                "{:?} indices written to a {:?} index buffer",
                T::INDEX_TYPE,
                self.index_type
            );
        }
        let data = self.indices_key()?;
        let offset = u64::from(first) * u64::from(self.index_type.size_bytes());
        manager.write_immediate(data, offset, bytemuck::cast_slice(indices))
    }

    // ===== DRAW-TIME =====

    /// Bind the index buffer; requires `build`
    pub fn use_buffer(&self, manager: &mut BufferManager) -> Result<()> {
        manager.use_buffer(self.buffer)
    }

    /// Draw `index_count()` indexed vertices
    pub fn render(&self, manager: &BufferManager, primitive: PrimitiveType) -> Result<()> {
        self.draw(manager, primitive, 1)
    }

    pub fn render_instanced(&self, manager: &BufferManager, primitive: PrimitiveType, instances: u32) -> Result<()> {
        if !manager.capabilities().supports(DeviceFeatures::HW_INSTANCING) {
            crate::engine_bail!(SOURCE, "Instanced draw requested but the device has no hardware instancing");
        }
        self.draw(manager, primitive, instances)
    }

    fn draw(&self, manager: &BufferManager, primitive: PrimitiveType, instances: u32) -> Result<()> {
        let key = self.indices_key()?;
        let Some(data) = manager.data(key) else {
            return Err(invalid_resource(format!("Stale index data {:?}", key)));
        };
        let source = if self.is_built(manager) {
            DataSource::Offset(data.first())
        } else {
            DataSource::Client(data.bytes())
        };
        let primitive = manager.primitive_code(primitive);
        let index_type = manager.type_table().scalar_code(self.index_type.scalar_type());

        lock_device(manager.device())?.draw_elements(primitive, self.index_count, index_type, source, instances);
        Ok(())
    }

    /// Unbind everything `use_buffer` calls bound
    pub fn finish_render(&self, manager: &mut BufferManager) -> Result<()> {
        manager.finish_render()
    }

    fn indices_key(&self) -> Result<BufferDataKey> {
        self.data
            .ok_or_else(|| invalid_resource(format!("{:?} has no indices", self.buffer)))
    }

    /// Release the GPU buffer; caller-owned indices are handed back
    pub fn destroy(self, manager: &mut BufferManager) -> Result<Option<BufferData>> {
        Ok(manager.destroy_buffer(self.buffer)?.into_iter().next())
    }
}

/// Index count of a slice, which draws address with 32 bits
fn index_count_of(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| invalid_resource(format!("{} indices exceed the 32-bit index count", len)))
}

fn invalid_resource(message: String) -> Error {
    crate::engine_error!(SOURCE, "{}", message);
    Error::InvalidResource(message)
}

#[cfg(test)]
#[path = "index_buffer_tests.rs"]
mod tests;
