/// VertexBufferData - byte layout of one vertex block
///
/// A block is a run of `vertex_count` vertices stored as:
///
/// ```text
/// [ interleaved area: vertex_count * stride ][ separate stream 0 ][ separate stream 1 ] ...
/// ```
///
/// Zero-stride streams share the interleaved area, each at the running sum
/// of the element sizes declared before it. Streams with an explicit stride
/// get their own area of `vertex_count * stride` bytes after it.

use std::ops::Range;
use bytemuck::Pod;
use crate::error::Result;
use crate::vertex::AttributeStream;

const SOURCE: &str = "galaxy3d::VertexBufferData";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexBufferData {
    streams: Vec<AttributeStream>,
    /// Interleaved stride (sum of the zero-stride element sizes)
    stride: u32,
    vertex_count: u32,
}

impl VertexBufferData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `stream` to the block layout
    ///
    /// Every stream of a block describes the same vertices; a different
    /// `vertex_count` than the previous streams replaces it and is logged.
    pub fn add_data_array(&mut self, mut stream: AttributeStream, vertex_count: u32) {
        if !self.streams.is_empty() && vertex_count != self.vertex_count {
            crate::engine_warn!(
                SOURCE,
                "Stream {:?} declares {} vertices, block had {}",
                stream.attribute(),
                vertex_count,
                self.vertex_count
            );
        }
        self.vertex_count = vertex_count;

        if stream.is_interleaved() {
            stream.offset = u64::from(self.stride);
            self.stride += stream.element_size();
        }
        self.streams.push(stream);
        self.place_separate_streams();
    }

    /// Separate areas start after the interleaved one, which moves whenever
    /// the stride or vertex count changes
    fn place_separate_streams(&mut self) {
        let vertices = u64::from(self.vertex_count);
        let mut offset = vertices * u64::from(self.stride);
        for stream in self.streams.iter_mut().filter(|s| !s.is_interleaved()) {
            stream.offset = offset;
            offset += vertices * u64::from(stream.stride());
        }
    }

    // ===== ACCESSORS =====

    pub fn streams(&self) -> &[AttributeStream] {
        &self.streams
    }

    /// Interleaved stride in bytes
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Bytes needed by the whole block
    pub fn size(&self) -> u64 {
        let vertices = u64::from(self.vertex_count);
        self.streams
            .iter()
            .filter(|s| !s.is_interleaved())
            .fold(vertices * u64::from(self.stride), |size, s| size + vertices * u64::from(s.stride()))
    }

    /// Byte distance between two vertices of `stream`
    pub fn stream_stride(&self, stream: &AttributeStream) -> u32 {
        if stream.is_interleaved() {
            self.stride
        } else {
            stream.stride()
        }
    }

    /// Byte ranges (relative to the block) holding vertices `range`
    ///
    /// One range for the interleaved area, one per separate stream. The
    /// vertex range is clamped to the block.
    pub fn vertex_byte_ranges(&self, range: Range<u32>) -> Vec<Range<u64>> {
        let start = u64::from(range.start.min(self.vertex_count));
        let end = u64::from(range.end.min(self.vertex_count));
        if start >= end {
            return Vec::new();
        }

        let mut ranges = Vec::new();
        if self.stride > 0 {
            let stride = u64::from(self.stride);
            ranges.push(start * stride..end * stride);
        }
        for stream in self.streams.iter().filter(|s| !s.is_interleaved()) {
            let stride = u64::from(stream.stride());
            ranges.push(stream.offset() + start * stride..stream.offset() + end * stride);
        }
        ranges
    }

    /// Write one element per vertex of stream `index` into `bytes`
    ///
    /// `T` must be exactly one element (e.g. `[f32; 3]` for a 3 x F32
    /// stream). Returns the byte range touched inside the block.
    pub fn write_stream<T: Pod>(&self, bytes: &mut [u8], index: usize, values: &[T]) -> Result<Range<u64>> {
        let Some(stream) = self.streams.get(index) else {
            crate::engine_bail!(SOURCE, "Stream {} out of range ({} streams)", index, self.streams.len());
        };
        let element = stream.element_size() as usize;
        if std::mem::size_of::<T>() != element {
            crate::engine_bail!(
                SOURCE,
                "Element of {} bytes written to a {}-byte {:?} stream",
                std::mem::size_of::<T>(),
                element,
                stream.attribute()
            );
        }
        if values.len() > self.vertex_count as usize {
            crate::engine_bail!(
                SOURCE,
                "{} elements written to a block of {} vertices",
                values.len(),
                self.vertex_count
            );
        }
        if values.is_empty() {
            return Ok(0..0);
        }

        let stride = self.stream_stride(stream) as usize;
        let base = stream.offset() as usize;
        let end = base + (values.len() - 1) * stride + element;
        if end > bytes.len() {
            crate::engine_bail!(SOURCE, "Stream write ends at {} past block size {}", end, bytes.len());
        }

        for (vertex, value) in values.iter().enumerate() {
            let at = base + vertex * stride;
            bytes[at..at + element].copy_from_slice(bytemuck::bytes_of(value));
        }
        Ok(base as u64..end as u64)
    }

    pub(crate) fn streams_mut(&mut self) -> &mut [AttributeStream] {
        &mut self.streams
    }
}

#[cfg(test)]
#[path = "vertex_buffer_data_tests.rs"]
mod tests;
