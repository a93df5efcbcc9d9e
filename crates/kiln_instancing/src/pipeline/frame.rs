//! Per-frame view data.

use glam::{DVec3, IVec3, Mat4, Vec3};

/// Camera and projection for one frame.
///
/// The camera position is kept in `f64` world coordinates; everything sent to
/// the GPU is derived relative to the floating origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView {
    /// View-projection matrix with the camera at (0, 0, 0).
    pub view_projection: Mat4,
    /// Camera position in world coordinates.
    pub camera: DVec3,
    /// Unit look direction.
    pub look: Vec3,
}

impl FrameView {
    /// Creates a frame view.
    #[must_use]
    pub fn new(view_projection: Mat4, camera: DVec3, look: Vec3) -> Self {
        Self {
            view_projection,
            camera,
            look: look.normalize_or_zero(),
        }
    }

    /// A view at `camera` looking down -Z with an identity projection.
    #[must_use]
    pub fn at(camera: DVec3) -> Self {
        Self::new(Mat4::IDENTITY, camera, Vec3::NEG_Z)
    }

    /// Camera position relative to `origin`.
    #[must_use]
    pub fn camera_relative(&self, origin: IVec3) -> Vec3 {
        (self.camera - origin.as_dvec3()).as_vec3()
    }

    /// View-projection for geometry expressed relative to `origin`.
    ///
    /// The `origin - camera` offset is computed in `f64` and is small, so the
    /// `f32` matrix stays precise far from the world origin.
    #[must_use]
    pub fn origin_view_projection(&self, origin: IVec3) -> Mat4 {
        let offset = (origin.as_dvec3() - self.camera).as_vec3();
        self.view_projection * Mat4::from_translation(offset)
    }
}
