//! Matrix stack for building instance and bake transforms.

use glam::{Mat3, Mat4, Quat, Vec3};

/// The centre of a unit block.
pub const CENTRE: Vec3 = Vec3::splat(0.5);

/// A stack of affine transforms. Operations post-multiply the top entry,
/// so they apply to geometry in reverse call order, like a pose stack.
#[derive(Clone, Debug)]
pub struct TransformStack {
    stack: Vec<Mat4>,
}

impl TransformStack {
    /// Creates a stack holding the identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: vec![Mat4::IDENTITY],
        }
    }

    fn top(&mut self) -> &mut Mat4 {
        // The base entry is never popped.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Current transform.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        self.stack[self.stack.len() - 1]
    }

    /// Inverse-transpose of the current transform's upper 3x3.
    #[must_use]
    pub fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(self.matrix()).inverse().transpose()
    }

    /// Saves the current transform.
    pub fn push(&mut self) -> &mut Self {
        let top = self.matrix();
        self.stack.push(top);
        self
    }

    /// Restores the last saved transform. Popping the base entry is ignored.
    pub fn pop(&mut self) -> &mut Self {
        if self.stack.len() > 1 {
            self.stack.pop();
        } else {
            tracing::warn!("TransformStack::pop on the base entry ignored");
        }
        self
    }

    /// Translates by `(x, y, z)`.
    pub fn translate(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.translate_vec(Vec3::new(x, y, z))
    }

    /// Translates by `v`.
    pub fn translate_vec(&mut self, v: Vec3) -> &mut Self {
        *self.top() *= Mat4::from_translation(v);
        self
    }

    /// Translates by `-v`.
    pub fn translate_back(&mut self, v: Vec3) -> &mut Self {
        self.translate_vec(-v)
    }

    /// Applies a rotation.
    pub fn multiply(&mut self, rotation: Quat) -> &mut Self {
        *self.top() *= Mat4::from_quat(rotation);
        self
    }

    /// Rotates about `axis` by `degrees`. A zero angle is a no-op.
    pub fn rotate(&mut self, axis: Vec3, degrees: f32) -> &mut Self {
        if degrees == 0.0 {
            return self;
        }
        self.multiply(Quat::from_axis_angle(axis.normalize(), degrees.to_radians()))
    }

    /// Rotates about `axis` by `radians`. A zero angle is a no-op.
    pub fn rotate_radians(&mut self, axis: Vec3, radians: f32) -> &mut Self {
        if radians == 0.0 {
            return self;
        }
        self.multiply(Quat::from_axis_angle(axis.normalize(), radians))
    }

    /// Rotates about +X by `degrees`.
    pub fn rotate_x(&mut self, degrees: f32) -> &mut Self {
        self.rotate(Vec3::X, degrees)
    }

    /// Rotates about +Y by `degrees`.
    pub fn rotate_y(&mut self, degrees: f32) -> &mut Self {
        self.rotate(Vec3::Y, degrees)
    }

    /// Rotates about +Z by `degrees`.
    pub fn rotate_z(&mut self, degrees: f32) -> &mut Self {
        self.rotate(Vec3::Z, degrees)
    }

    /// Scales uniformly.
    pub fn scale(&mut self, factor: f32) -> &mut Self {
        *self.top() *= Mat4::from_scale(Vec3::splat(factor));
        self
    }

    /// Scales per axis.
    pub fn scale_xyz(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        *self.top() *= Mat4::from_scale(Vec3::new(x, y, z));
        self
    }

    /// Moves to the block centre.
    pub fn centre(&mut self) -> &mut Self {
        self.translate_vec(CENTRE)
    }

    /// Moves back from the block centre.
    pub fn uncentre(&mut self) -> &mut Self {
        self.translate_back(CENTRE)
    }

    /// Offsets by a tiny, deterministic per-id amount to break z-fighting
    /// between coplanar instances. Each axis moves by less than 0.002.
    pub fn nudge(&mut self, id: i32) -> &mut Self {
        let mut bits = i64::from(id).wrapping_mul(31).wrapping_mul(493_286_711);
        bits = bits
            .wrapping_mul(bits)
            .wrapping_mul(4_392_167_121)
            .wrapping_add(bits.wrapping_mul(98_761));

        let axis = |shift: u32| (((bits >> shift) & 7) as f32 + 0.5) / 8.0 - 0.5;
        self.translate(axis(16) * 0.004, axis(20) * 0.004, axis(24) * 0.004)
    }
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}
