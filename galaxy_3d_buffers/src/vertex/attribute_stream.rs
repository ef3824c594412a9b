/// AttributeStream - description of one vertex attribute inside a vertex block
///
/// A stream describes bytes, it never owns them. With a stride of 0 the
/// stream is interleaved with the other zero-stride streams of its block; a
/// non-zero stride places it in its own tightly addressed area after the
/// interleaved one.

use crate::graphics_device::{ScalarType, VertexAttribute};

const SOURCE: &str = "galaxy3d::AttributeStream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeStream {
    attribute: VertexAttribute,
    scalar_type: ScalarType,
    components: u8,
    stride: u32,
    /// Byte offset inside the vertex block, assigned by the block layout
    pub(crate) offset: u64,
}

impl AttributeStream {
    /// Interleaved stream of `components` scalars (clamped to 1..=4)
    pub fn new(attribute: VertexAttribute, scalar_type: ScalarType, components: u8) -> Self {
        let clamped = components.clamp(1, 4);
        if clamped != components {
            crate::engine_warn!(
                SOURCE,
                "{:?} stream with {} components, clamping to {}",
                attribute,
                components,
                clamped
            );
        }
        Self {
            attribute,
            scalar_type,
            components: clamped,
            stride: 0,
            offset: 0,
        }
    }

    /// Same stream stored in its own area, `stride` bytes per vertex
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    // ===== ACCESSORS =====

    pub fn attribute(&self) -> VertexAttribute {
        self.attribute
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    pub fn components(&self) -> u8 {
        self.components
    }

    /// Declared stride, 0 for interleaved streams
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Byte offset inside the vertex block
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes of one element (`components * size_of(scalar_type)`)
    pub fn element_size(&self) -> u32 {
        self.scalar_type.size_bytes() * u32::from(self.components)
    }

    pub fn is_interleaved(&self) -> bool {
        self.stride == 0
    }

    pub(crate) fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attribute = attribute;
        self
    }
}

#[cfg(test)]
#[path = "attribute_stream_tests.rs"]
mod tests;
