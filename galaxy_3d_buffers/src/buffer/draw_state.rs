/// DrawState - what the current context has bound for drawing
///
/// Kept per `BufferManager` so `finish_render` undoes exactly what the last
/// activations did, and does nothing the second time.

use crate::graphics_device::{BufferHandle, BufferTarget, GraphicsDevice, VertexArrayHandle, VertexAttribute};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrawState {
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
    generic_buffer: Option<BufferHandle>,
    enabled: Vec<VertexAttribute>,
    sequence: Option<VertexArrayHandle>,
}

impl DrawState {
    /// True when nothing is bound or enabled
    pub fn is_clear(&self) -> bool {
        self.vertex_buffer.is_none()
            && self.index_buffer.is_none()
            && self.generic_buffer.is_none()
            && self.enabled.is_empty()
            && self.sequence.is_none()
    }

    pub fn bound_buffer(&self, target: BufferTarget) -> Option<BufferHandle> {
        match target {
            BufferTarget::Vertex => self.vertex_buffer,
            BufferTarget::Index => self.index_buffer,
            BufferTarget::Generic => self.generic_buffer,
        }
    }

    pub fn enabled_attributes(&self) -> &[VertexAttribute] {
        &self.enabled
    }

    pub fn sequence(&self) -> Option<VertexArrayHandle> {
        self.sequence
    }

    pub(crate) fn bind_buffer(&mut self, target: BufferTarget, handle: BufferHandle) {
        match target {
            BufferTarget::Vertex => self.vertex_buffer = Some(handle),
            BufferTarget::Index => self.index_buffer = Some(handle),
            BufferTarget::Generic => self.generic_buffer = Some(handle),
        }
    }

    /// Returns false when the attribute was already enabled
    pub(crate) fn enable(&mut self, attribute: VertexAttribute) -> bool {
        if self.enabled.contains(&attribute) {
            false
        } else {
            self.enabled.push(attribute);
            true
        }
    }

    pub(crate) fn bind_sequence(&mut self, handle: VertexArrayHandle) {
        self.sequence = Some(handle);
    }

    /// Forget a buffer that is being deleted
    pub(crate) fn forget_buffer(&mut self, handle: BufferHandle) {
        for slot in [&mut self.vertex_buffer, &mut self.index_buffer, &mut self.generic_buffer] {
            if *slot == Some(handle) {
                *slot = None;
            }
        }
    }

    pub(crate) fn forget_sequence(&mut self, handle: VertexArrayHandle) {
        if self.sequence == Some(handle) {
            self.sequence = None;
        }
    }

    /// Unbind the sequence, disable attributes in enable order, unbind buffers
    pub(crate) fn release(self, device: &mut dyn GraphicsDevice) {
        if self.sequence.is_some() {
            device.bind_vertex_array(None);
        }
        for attribute in &self.enabled {
            device.disable_attribute(*attribute);
        }
        if self.vertex_buffer.is_some() {
            device.bind_buffer(BufferTarget::Vertex, None);
        }
        if self.index_buffer.is_some() {
            device.bind_buffer(BufferTarget::Index, None);
        }
        if self.generic_buffer.is_some() {
            device.bind_buffer(BufferTarget::Generic, None);
        }
    }
}
