//! Vertex layout descriptions.
//!
//! A [`VertexFormat`] is an ordered list of attributes. Attributes are tightly
//! packed in declaration order, so the stride is simply the sum of their
//! sizes. Formats are compared structurally; two materials with equal formats
//! can share a program binding.

/// Semantic meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    /// Vertex position.
    Position,
    /// Vertex normal.
    Normal,
    /// Texture coordinates.
    TexCoord,
    /// Packed light levels.
    Light,
    /// Vertex or instance color.
    Color,
    /// Column of an instance transform, 0-3.
    Transform(u8),
    /// Column of an instance normal matrix, 0-2.
    NormalMatrix(u8),
    /// Instance rotation quaternion.
    Rotation,
    /// Rotation pivot.
    Pivot,
}

/// Numeric type of one attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// 32-bit float.
    F32,
    /// Signed byte, normalized to -1.0..=1.0 by the shader.
    I8Norm,
    /// Unsigned byte, normalized to 0.0..=1.0 by the shader.
    U8Norm,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 32-bit integer.
    U32,
}

impl ComponentType {
    /// Size of one component in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::I8Norm | Self::U8Norm => 1,
            Self::I16 => 2,
            Self::F32 | Self::U32 => 4,
        }
    }
}

/// One attribute of a vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// What the attribute means.
    pub semantic: Semantic,
    /// Number of components (1-4).
    pub components: u8,
    /// Component type.
    pub kind: ComponentType,
}

impl VertexAttribute {
    /// Creates an attribute.
    #[must_use]
    pub const fn new(semantic: Semantic, components: u8, kind: ComponentType) -> Self {
        Self {
            semantic,
            components,
            kind,
        }
    }

    /// Size of the attribute in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.components as usize * self.kind.size()
    }
}

/// Byte layout of one vertex (or one instance record).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    attributes: Vec<VertexAttribute>,
    stride: usize,
}

impl VertexFormat {
    /// Creates a format from attributes in packing order.
    #[must_use]
    pub fn new(attributes: Vec<VertexAttribute>) -> Self {
        let stride = attributes.iter().map(VertexAttribute::size).sum();
        Self { attributes, stride }
    }

    /// The block model layout: float position, byte normal, float UV.
    #[must_use]
    pub fn block() -> Self {
        Self::new(vec![
            VertexAttribute::new(Semantic::Position, 3, ComponentType::F32),
            VertexAttribute::new(Semantic::Normal, 3, ComponentType::I8Norm),
            VertexAttribute::new(Semantic::TexCoord, 2, ComponentType::F32),
        ])
    }

    /// Attributes in packing order.
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Bytes per vertex.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Byte offset of each attribute within a vertex.
    pub fn offsets(&self) -> impl Iterator<Item = (usize, &VertexAttribute)> {
        self.attributes.iter().scan(0, |offset, attribute| {
            let current = *offset;
            *offset += attribute.size();
            Some((current, attribute))
        })
    }
}
