//! The rasterizer boundary.
//!
//! The host owns model baking. It hands the instancing core a flat stream of
//! quads (four vertices per face, consistent winding) and nothing else.

use glam::Mat4;

use crate::error::RasterizeError;
use crate::transform::TransformStack;

/// One rasterized vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RasterVertex {
    /// Model-space position.
    pub position: [f32; 3],
    /// Normal, normalized to the signed byte range.
    pub normal: [i8; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

impl RasterVertex {
    /// Creates a vertex.
    #[must_use]
    pub const fn new(position: [f32; 3], normal: [i8; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// A rasterized mesh: consecutive groups of four vertices, one group per face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RasterizedMesh {
    vertices: Vec<RasterVertex>,
}

impl RasterizedMesh {
    /// Wraps a raw vertex stream.
    #[must_use]
    pub fn new(vertices: Vec<RasterVertex>) -> Self {
        Self { vertices }
    }

    /// Builds a stream from whole quads.
    pub fn from_quads(quads: impl IntoIterator<Item = [RasterVertex; 4]>) -> Self {
        Self {
            vertices: quads.into_iter().flatten().collect(),
        }
    }

    /// The raw vertex stream.
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[RasterVertex] {
        &self.vertices
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of complete quads.
    #[inline]
    #[must_use]
    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }
}

/// The host's model rasterizer.
pub trait MeshRasterizer<M> {
    /// Bakes `model` under `transform` into a quad stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be baked.
    fn rasterize(&self, model: &M, transform: &Mat4) -> Result<RasterizedMesh, RasterizeError>;
}

/// One of the six axis-aligned faces a model can be turned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Orientation {
    /// -Y
    Down,
    /// +Y
    Up,
    /// -Z
    North,
    /// +Z
    South,
    /// -X
    West,
    /// +X
    East,
}

impl Orientation {
    /// All orientations.
    pub const ALL: [Self; 6] = [
        Self::Down,
        Self::Up,
        Self::North,
        Self::South,
        Self::West,
        Self::East,
    ];

    /// Yaw in degrees that turns a south-facing model to this face.
    #[must_use]
    pub const fn horizontal_angle(self) -> f32 {
        match self {
            Self::South | Self::Up | Self::Down => 0.0,
            Self::West => -90.0,
            Self::North => 180.0,
            Self::East => -270.0,
        }
    }

    /// Pitch in degrees that tips a model up or down.
    #[must_use]
    pub const fn vertical_angle(self) -> f32 {
        match self {
            Self::Up => -90.0,
            Self::Down => 90.0,
            _ => 0.0,
        }
    }

    /// Transform rotating a unit block about its centre to face this way.
    #[must_use]
    pub fn rotate_to_face(self) -> Mat4 {
        TransformStack::new()
            .centre()
            .rotate_y(self.horizontal_angle())
            .rotate_x(self.vertical_angle())
            .uncentre()
            .matrix()
    }
}

/// Structural cache key: a model, optionally turned to a face.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelKey<M> {
    /// Model identifier.
    pub model: M,
    /// Orientation, if the model is rotated before baking.
    pub orientation: Option<Orientation>,
}

impl<M> ModelKey<M> {
    /// Key for an unrotated model.
    pub const fn new(model: M) -> Self {
        Self {
            model,
            orientation: None,
        }
    }

    /// Key for a model turned to `orientation`.
    pub const fn oriented(model: M, orientation: Orientation) -> Self {
        Self {
            model,
            orientation: Some(orientation),
        }
    }

    /// Transform applied when baking this key.
    #[must_use]
    pub fn transform(&self) -> Mat4 {
        self.orientation
            .map_or(Mat4::IDENTITY, Orientation::rotate_to_face)
    }
}
