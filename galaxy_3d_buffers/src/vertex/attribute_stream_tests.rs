/// Unit tests for AttributeStream

use crate::graphics_device::{ScalarType, VertexAttribute};
use crate::vertex::AttributeStream;

#[test]
fn test_element_size_is_components_times_scalar() {
    let position = AttributeStream::new(VertexAttribute::Position, ScalarType::F32, 3);
    let color = AttributeStream::new(VertexAttribute::Color, ScalarType::U8, 4);
    let uv = AttributeStream::new(VertexAttribute::TexCoord(0), ScalarType::F16, 2);

    assert_eq!(position.element_size(), 12);
    assert_eq!(color.element_size(), 4);
    assert_eq!(uv.element_size(), 4);
}

#[test]
fn test_new_stream_is_interleaved() {
    let stream = AttributeStream::new(VertexAttribute::Normal, ScalarType::F32, 3);
    assert!(stream.is_interleaved());
    assert_eq!(stream.stride(), 0);
    assert_eq!(stream.offset(), 0);
}

#[test]
fn test_with_stride_is_separate() {
    let stream = AttributeStream::new(VertexAttribute::Generic(2), ScalarType::F32, 1).with_stride(8);
    assert!(!stream.is_interleaved());
    assert_eq!(stream.stride(), 8);
    assert_eq!(stream.element_size(), 4);
}

#[test]
fn test_components_are_clamped() {
    let none = AttributeStream::new(VertexAttribute::Position, ScalarType::F32, 0);
    let many = AttributeStream::new(VertexAttribute::Position, ScalarType::F32, 7);
    assert_eq!(none.components(), 1);
    assert_eq!(many.components(), 4);
    assert_eq!(many.element_size(), 16);
}
