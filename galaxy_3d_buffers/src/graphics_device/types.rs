/// Scalar, primitive and attribute types, and their translation to driver codes

use crate::graphics_device::DeviceCapabilities;

// ============================================================================
// Scalar types
// ============================================================================

/// Scalar type of one attribute or index component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F16,
    F32,
    F64,
}

impl ScalarType {
    /// All scalar types, in `TypeTable` order
    pub const ALL: [ScalarType; 9] = [
        ScalarType::I8,
        ScalarType::U8,
        ScalarType::I16,
        ScalarType::U16,
        ScalarType::I32,
        ScalarType::U32,
        ScalarType::F16,
        ScalarType::F32,
        ScalarType::F64,
    ];

    /// Size in bytes of one component
    pub fn size_bytes(&self) -> u32 {
        match self {
            ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 | ScalarType::F16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::F64 => 8,
        }
    }

    fn table_index(self) -> usize {
        self as usize
    }
}

// ============================================================================
// Primitives
// ============================================================================

/// Primitive assembled by a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 6] = [
        PrimitiveType::Points,
        PrimitiveType::Lines,
        PrimitiveType::LineStrip,
        PrimitiveType::Triangles,
        PrimitiveType::TriangleStrip,
        PrimitiveType::TriangleFan,
    ];

    /// Whether the primitive has an adjacency form
    pub fn has_adjacency(&self) -> bool {
        matches!(
            self,
            PrimitiveType::Lines
                | PrimitiveType::LineStrip
                | PrimitiveType::Triangles
                | PrimitiveType::TriangleStrip
        )
    }

    fn table_index(self) -> usize {
        self as usize
    }
}

/// Per-context selection of the primitive family used for draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveVariant {
    /// Plain primitives
    #[default]
    Standard,
    /// Primitives with adjacency information (geometry shaders)
    Adjacency,
    /// Tessellation patches
    Patches,
}

// ============================================================================
// Vertex attributes
// ============================================================================

/// Semantic role of an attribute stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    Position,
    Normal,
    Color,
    /// Texture coordinate set N
    TexCoord(u8),
    /// Generic attribute slot N
    Generic(u8),
}

impl VertexAttribute {
    /// Closest attribute the device can address
    ///
    /// A texture coordinate set or generic slot beyond the device maximum is
    /// clamped to the last valid one and logged as a warning.
    pub fn clamp_to(self, caps: &DeviceCapabilities) -> VertexAttribute {
        match self {
            VertexAttribute::TexCoord(set) if u32::from(set) >= caps.max_texture_coords => {
                let clamped = caps.max_texture_coords.saturating_sub(1).min(u32::from(u8::MAX)) as u8;
                crate::engine_warn!(
                    "galaxy3d::VertexAttribute",
                    "Texture coordinate set {} exceeds device maximum {}, using set {}",
                    set, caps.max_texture_coords, clamped
                );
                VertexAttribute::TexCoord(clamped)
            }
            VertexAttribute::Generic(slot) if u32::from(slot) >= caps.max_vertex_attributes => {
                let clamped = caps.max_vertex_attributes.saturating_sub(1).min(u32::from(u8::MAX)) as u8;
                crate::engine_warn!(
                    "galaxy3d::VertexAttribute",
                    "Generic attribute slot {} exceeds device maximum {}, using slot {}",
                    slot, caps.max_vertex_attributes, clamped
                );
                VertexAttribute::Generic(clamped)
            }
            other => other,
        }
    }
}

// ============================================================================
// Type table
// ============================================================================

/// Translation from engine types to driver codes
///
/// Defaults to the OpenGL enumerants. A backend with different codes
/// overrides entries with the setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTable {
    scalar_codes: [u32; 9],
    primitive_codes: [u32; 6],
    adjacency_codes: [Option<u32>; 6],
    patch_code: u32,
}

impl TypeTable {
    /// OpenGL codes
    pub fn gl() -> Self {
        Self {
            // BYTE, UNSIGNED_BYTE, SHORT, UNSIGNED_SHORT, INT, UNSIGNED_INT,
            // HALF_FLOAT, FLOAT, DOUBLE
            scalar_codes: [0x1400, 0x1401, 0x1402, 0x1403, 0x1404, 0x1405, 0x140B, 0x1406, 0x140A],
            // POINTS, LINES, LINE_STRIP, TRIANGLES, TRIANGLE_STRIP, TRIANGLE_FAN
            primitive_codes: [0x0, 0x1, 0x3, 0x4, 0x5, 0x6],
            adjacency_codes: [None, Some(0xA), Some(0xB), Some(0xC), Some(0xD), None],
            patch_code: 0xE,
        }
    }

    pub fn scalar_code(&self, scalar: ScalarType) -> u32 {
        self.scalar_codes[scalar.table_index()]
    }

    pub fn set_scalar_code(&mut self, scalar: ScalarType, code: u32) {
        self.scalar_codes[scalar.table_index()] = code;
    }

    pub fn set_primitive_code(&mut self, primitive: PrimitiveType, code: u32) {
        self.primitive_codes[primitive.table_index()] = code;
    }

    pub fn set_adjacency_code(&mut self, primitive: PrimitiveType, code: Option<u32>) {
        self.adjacency_codes[primitive.table_index()] = code;
    }

    pub fn set_patch_code(&mut self, code: u32) {
        self.patch_code = code;
    }

    /// Driver code for `primitive` in the selected variant
    ///
    /// A primitive without an adjacency form falls back to its standard code
    /// with a warning.
    pub fn primitive_code(&self, primitive: PrimitiveType, variant: PrimitiveVariant) -> u32 {
        let index = primitive.table_index();
        match variant {
            PrimitiveVariant::Standard => self.primitive_codes[index],
            PrimitiveVariant::Patches => self.patch_code,
            PrimitiveVariant::Adjacency => match self.adjacency_codes[index] {
                Some(code) => code,
                None => {
                    crate::engine_warn!(
                        "galaxy3d::TypeTable",
                        "{:?} has no adjacency form, drawing standard primitive",
                        primitive
                    );
                    self.primitive_codes[index]
                }
            },
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::gl()
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
