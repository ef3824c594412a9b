/// Unit tests for scalar/primitive/attribute types and the type table

use crate::graphics_device::{
    DeviceCapabilities, DeviceFeatures, PrimitiveType, PrimitiveVariant, ScalarType, TypeTable,
    VertexAttribute,
};

fn caps(max_attributes: u32, max_coords: u32) -> DeviceCapabilities {
    DeviceCapabilities {
        features: DeviceFeatures::all(),
        max_vertex_attributes: max_attributes,
        max_texture_coords: max_coords,
    }
}

// ============================================================================
// ScalarType Tests
// ============================================================================

#[test]
fn test_scalar_sizes() {
    assert_eq!(ScalarType::I8.size_bytes(), 1);
    assert_eq!(ScalarType::U8.size_bytes(), 1);
    assert_eq!(ScalarType::I16.size_bytes(), 2);
    assert_eq!(ScalarType::F16.size_bytes(), 2);
    assert_eq!(ScalarType::U32.size_bytes(), 4);
    assert_eq!(ScalarType::F32.size_bytes(), 4);
    assert_eq!(ScalarType::F64.size_bytes(), 8);
}

#[test]
fn test_gl_scalar_codes() {
    let table = TypeTable::gl();
    assert_eq!(table.scalar_code(ScalarType::U8), 0x1401);
    assert_eq!(table.scalar_code(ScalarType::U16), 0x1403);
    assert_eq!(table.scalar_code(ScalarType::U32), 0x1405);
    assert_eq!(table.scalar_code(ScalarType::F32), 0x1406);
    assert_eq!(table.scalar_code(ScalarType::F64), 0x140A);
    assert_eq!(table.scalar_code(ScalarType::F16), 0x140B);
}

#[test]
fn test_scalar_code_override() {
    let mut table = TypeTable::default();
    table.set_scalar_code(ScalarType::F32, 99);
    assert_eq!(table.scalar_code(ScalarType::F32), 99);
    assert_eq!(table.scalar_code(ScalarType::F64), 0x140A);
}

// ============================================================================
// Primitive Tests
// ============================================================================

#[test]
fn test_standard_primitive_codes() {
    let table = TypeTable::gl();
    let codes: Vec<u32> = PrimitiveType::ALL
        .iter()
        .map(|p| table.primitive_code(*p, PrimitiveVariant::Standard))
        .collect();
    assert_eq!(codes, vec![0x0, 0x1, 0x3, 0x4, 0x5, 0x6]);
}

#[test]
fn test_adjacency_primitive_codes() {
    let table = TypeTable::gl();
    assert_eq!(table.primitive_code(PrimitiveType::Lines, PrimitiveVariant::Adjacency), 0xA);
    assert_eq!(table.primitive_code(PrimitiveType::LineStrip, PrimitiveVariant::Adjacency), 0xB);
    assert_eq!(table.primitive_code(PrimitiveType::Triangles, PrimitiveVariant::Adjacency), 0xC);
    assert_eq!(table.primitive_code(PrimitiveType::TriangleStrip, PrimitiveVariant::Adjacency), 0xD);
}

#[test]
fn test_adjacency_falls_back_to_standard() {
    let table = TypeTable::gl();
    assert!(!PrimitiveType::Points.has_adjacency());
    assert!(!PrimitiveType::TriangleFan.has_adjacency());
    assert_eq!(table.primitive_code(PrimitiveType::Points, PrimitiveVariant::Adjacency), 0x0);
    assert_eq!(table.primitive_code(PrimitiveType::TriangleFan, PrimitiveVariant::Adjacency), 0x6);
}

#[test]
fn test_patch_variant_uses_patch_code() {
    let mut table = TypeTable::gl();
    for primitive in PrimitiveType::ALL {
        assert_eq!(table.primitive_code(primitive, PrimitiveVariant::Patches), 0xE);
    }
    table.set_patch_code(42);
    assert_eq!(table.primitive_code(PrimitiveType::Triangles, PrimitiveVariant::Patches), 42);
}

#[test]
fn test_primitive_override() {
    let mut table = TypeTable::gl();
    table.set_primitive_code(PrimitiveType::Triangles, 7);
    table.set_adjacency_code(PrimitiveType::Points, Some(8));
    assert_eq!(table.primitive_code(PrimitiveType::Triangles, PrimitiveVariant::Standard), 7);
    assert_eq!(table.primitive_code(PrimitiveType::Points, PrimitiveVariant::Adjacency), 8);
}

// ============================================================================
// VertexAttribute Tests
// ============================================================================

#[test]
fn test_attribute_within_limits_is_unchanged() {
    let caps = caps(16, 8);
    assert_eq!(VertexAttribute::Position.clamp_to(&caps), VertexAttribute::Position);
    assert_eq!(VertexAttribute::TexCoord(7).clamp_to(&caps), VertexAttribute::TexCoord(7));
    assert_eq!(VertexAttribute::Generic(15).clamp_to(&caps), VertexAttribute::Generic(15));
}

#[test]
fn test_attribute_beyond_limits_is_clamped() {
    let caps = caps(16, 8);
    assert_eq!(VertexAttribute::TexCoord(12).clamp_to(&caps), VertexAttribute::TexCoord(7));
    assert_eq!(VertexAttribute::Generic(200).clamp_to(&caps), VertexAttribute::Generic(15));
}
