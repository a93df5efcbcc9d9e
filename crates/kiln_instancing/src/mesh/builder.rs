//! Rasterized quads to GPU-ready buffers.

use super::format::{ComponentType, Semantic, VertexFormat};
use super::raster::{RasterVertex, RasterizedMesh};
use crate::error::{BuildError, BuildResult};

/// Indices per quad: two triangles.
pub const INDICES_PER_QUAD: usize = 6;

/// Triangle pattern applied to every quad.
const QUAD_PATTERN: [u32; INDICES_PER_QUAD] = [0, 1, 2, 0, 2, 3];

/// An immutable, packed model mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBuffer {
    format: VertexFormat,
    vertices: Vec<u8>,
    vertex_count: usize,
    indices: Vec<u32>,
}

impl MeshBuffer {
    /// Layout of [`MeshBuffer::vertex_bytes`].
    #[inline]
    #[must_use]
    pub fn format(&self) -> &VertexFormat {
        &self.format
    }

    /// Packed vertex data, native byte order.
    #[inline]
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Triangle indices.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of indices.
    #[inline]
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// True if the mesh has no geometry.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }
}

/// Indices for `vertex_count` sequential quad vertices, two triangles per quad.
#[must_use]
pub fn quad_indices(vertex_count: usize) -> Vec<u32> {
    (0..vertex_count / 4)
        .flat_map(|quad| {
            let base = (quad * 4) as u32;
            QUAD_PATTERN.map(|i| base + i)
        })
        .collect()
}

/// Packs rasterized vertices into a [`VertexFormat`].
#[derive(Debug, Clone)]
pub struct MeshBufferBuilder {
    format: VertexFormat,
}

enum Source<'a> {
    Float(&'a [f32]),
    Byte(&'a [i8]),
}

impl MeshBufferBuilder {
    /// Creates a builder writing `format`.
    #[must_use]
    pub fn new(format: VertexFormat) -> Self {
        Self { format }
    }

    /// The output format.
    #[must_use]
    pub fn format(&self) -> &VertexFormat {
        &self.format
    }

    /// Packs `mesh` and derives its index buffer.
    ///
    /// An empty mesh produces an empty, valid buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::IncompleteQuad`] if the vertex count is not a
    /// multiple of four, and [`BuildError::UnsupportedAttribute`] if the format
    /// needs data a rasterized vertex does not carry.
    pub fn build(&self, mesh: &RasterizedMesh) -> BuildResult<MeshBuffer> {
        let vertex_count = mesh.vertex_count();
        if vertex_count % 4 != 0 {
            return Err(BuildError::IncompleteQuad { vertex_count });
        }
        if let Some(attribute) = self
            .format
            .attributes()
            .iter()
            .find(|a| !matches!(a.semantic, Semantic::Position | Semantic::Normal | Semantic::TexCoord))
        {
            return Err(BuildError::UnsupportedAttribute {
                semantic: attribute.semantic,
            });
        }

        let mut vertices = Vec::with_capacity(vertex_count * self.format.stride());
        for vertex in mesh.vertices() {
            self.write_vertex(&mut vertices, vertex);
        }
        debug_assert_eq!(vertices.len(), vertex_count * self.format.stride());

        Ok(MeshBuffer {
            format: self.format.clone(),
            vertices,
            vertex_count,
            indices: quad_indices(vertex_count),
        })
    }

    fn write_vertex(&self, out: &mut Vec<u8>, vertex: &RasterVertex) {
        for attribute in self.format.attributes() {
            let source = match attribute.semantic {
                Semantic::Position => Source::Float(&vertex.position),
                Semantic::Normal => Source::Byte(&vertex.normal),
                _ => Source::Float(&vertex.uv),
            };
            for i in 0..attribute.components as usize {
                write_component(out, attribute.kind, &source, i);
            }
        }
    }
}

fn write_component(out: &mut Vec<u8>, kind: ComponentType, source: &Source<'_>, i: usize) {
    let (float, byte) = match *source {
        Source::Float(values) => {
            let f = values.get(i).copied().unwrap_or(0.0);
            (f, None)
        }
        Source::Byte(values) => {
            let b = values.get(i).copied().unwrap_or(0);
            (f32::from(b) / 127.0, Some(b))
        }
    };

    match kind {
        ComponentType::F32 => out.extend_from_slice(&float.to_ne_bytes()),
        ComponentType::I8Norm => {
            let b = byte.unwrap_or_else(|| (float.clamp(-1.0, 1.0) * 127.0).round() as i8);
            out.extend_from_slice(&b.to_ne_bytes());
        }
        ComponentType::U8Norm => {
            let unit = if byte.is_some() { float * 0.5 + 0.5 } else { float };
            out.push((unit.clamp(0.0, 1.0) * 255.0).round() as u8);
        }
        ComponentType::I16 => {
            let v = byte.map_or(float as i16, i16::from);
            out.extend_from_slice(&v.to_ne_bytes());
        }
        ComponentType::U32 => {
            let v = byte.map_or(float as u32, |b| b.max(0) as u32);
            out.extend_from_slice(&v.to_ne_bytes());
        }
    }
}
