//! Per-instance records uploaded to the GPU.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Quat, Vec3};

use crate::mesh::{ComponentType, Semantic, VertexAttribute, VertexFormat};
use crate::transform::TransformStack;

/// A per-instance GPU record.
///
/// Records are plain old data: the instance buffer is the records' bytes,
/// back to back. [`InstanceData::format`] must describe exactly
/// `size_of::<Self>()` bytes.
pub trait InstanceData: Pod + Default + Send + Sync + 'static {
    /// Attribute layout of one record.
    fn format() -> VertexFormat;

    /// Re-expresses the record after the floating origin moved by `delta`.
    ///
    /// Positions are origin-relative, so they move by `-delta`.
    fn shift_origin(&mut self, delta: Vec3);
}

/// Converts a 0-15 light level to the normalized value shaders expect.
#[inline]
fn unit_light(level: u8) -> f32 {
    f32::from(level.min(15)) / 15.0
}

/// Record for models placed with a full transform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelData {
    /// Model-to-origin transform, column major.
    pub transform: [[f32; 4]; 4],
    /// Normal matrix, column major.
    pub normal: [[f32; 3]; 3],
    /// RGBA tint.
    pub color: [u8; 4],
    /// Block and sky light, normalized.
    pub light: [f32; 2],
}

impl Default for ModelData {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY.to_cols_array_2d(),
            normal: Mat3::IDENTITY.to_cols_array_2d(),
            color: [255; 4],
            light: [1.0, 1.0],
        }
    }
}

impl ModelData {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Takes transform and normal matrix from a stack.
    pub fn set_transform(&mut self, stack: &TransformStack) -> &mut Self {
        self.transform = stack.matrix().to_cols_array_2d();
        self.normal = stack.normal_matrix().to_cols_array_2d();
        self
    }

    /// Sets transform and normal matrix directly.
    pub fn set_matrices(&mut self, transform: Mat4, normal: Mat3) -> &mut Self {
        self.transform = transform.to_cols_array_2d();
        self.normal = normal.to_cols_array_2d();
        self
    }

    /// Sets block and sky light from 0-15 levels.
    pub fn set_light(&mut self, block: u8, sky: u8) -> &mut Self {
        self.light = [unit_light(block), unit_light(sky)];
        self
    }

    /// Sets the RGBA tint.
    pub fn set_color(&mut self, r: u8, g: u8, b: u8, a: u8) -> &mut Self {
        self.color = [r, g, b, a];
        self
    }

    /// Translation part of the transform.
    #[must_use]
    pub fn translation(&self) -> Vec3 {
        let [x, y, z, _] = self.transform[3];
        Vec3::new(x, y, z)
    }
}

impl InstanceData for ModelData {
    fn format() -> VertexFormat {
        let mut attributes: Vec<_> = (0..4)
            .map(|c| VertexAttribute::new(Semantic::Transform(c), 4, ComponentType::F32))
            .collect();
        attributes.extend(
            (0..3).map(|c| VertexAttribute::new(Semantic::NormalMatrix(c), 3, ComponentType::F32)),
        );
        attributes.push(VertexAttribute::new(Semantic::Color, 4, ComponentType::U8Norm));
        attributes.push(VertexAttribute::new(Semantic::Light, 2, ComponentType::F32));
        VertexFormat::new(attributes)
    }

    fn shift_origin(&mut self, delta: Vec3) {
        let column = &mut self.transform[3];
        column[0] -= delta.x;
        column[1] -= delta.y;
        column[2] -= delta.z;
    }
}

/// Record for models that sit at a position and spin about a pivot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct OrientedData {
    /// Origin-relative position.
    pub position: [f32; 3],
    /// Pivot in model space.
    pub pivot: [f32; 3],
    /// Rotation quaternion (x, y, z, w).
    pub rotation: [f32; 4],
    /// Block and sky light, normalized.
    pub light: [f32; 2],
    /// RGBA tint.
    pub color: [u8; 4],
}

impl Default for OrientedData {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            pivot: [0.5; 3],
            rotation: Quat::IDENTITY.to_array(),
            light: [1.0, 1.0],
            color: [255; 4],
        }
    }
}

impl OrientedData {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Sets the origin-relative position.
    pub fn set_position(&mut self, position: Vec3) -> &mut Self {
        self.position = position.to_array();
        self
    }

    /// Adds to the position.
    pub fn nudge(&mut self, offset: Vec3) -> &mut Self {
        self.position = (Vec3::from(self.position) + offset).to_array();
        self
    }

    /// Sets the pivot.
    pub fn set_pivot(&mut self, pivot: Vec3) -> &mut Self {
        self.pivot = pivot.to_array();
        self
    }

    /// Sets the rotation.
    pub fn set_rotation(&mut self, rotation: Quat) -> &mut Self {
        self.rotation = rotation.to_array();
        self
    }

    /// Sets block and sky light from 0-15 levels.
    pub fn set_light(&mut self, block: u8, sky: u8) -> &mut Self {
        self.light = [unit_light(block), unit_light(sky)];
        self
    }

    /// Sets the RGBA tint.
    pub fn set_color(&mut self, r: u8, g: u8, b: u8, a: u8) -> &mut Self {
        self.color = [r, g, b, a];
        self
    }
}

impl InstanceData for OrientedData {
    fn format() -> VertexFormat {
        VertexFormat::new(vec![
            VertexAttribute::new(Semantic::Position, 3, ComponentType::F32),
            VertexAttribute::new(Semantic::Pivot, 3, ComponentType::F32),
            VertexAttribute::new(Semantic::Rotation, 4, ComponentType::F32),
            VertexAttribute::new(Semantic::Light, 2, ComponentType::F32),
            VertexAttribute::new(Semantic::Color, 4, ComponentType::U8Norm),
        ])
    }

    fn shift_origin(&mut self, delta: Vec3) {
        self.position = (Vec3::from(self.position) - delta).to_array();
    }
}
