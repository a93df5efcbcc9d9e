//! Render pipeline: materials grouped by layer, drawn once per frame.
//!
//! A [`MaterialManager`] owns every instanced material of one world. Each
//! frame the host calls [`MaterialManager::check_and_shift_origin`] and then
//! [`MaterialManager::render`] once per [`RenderLayer`], in the host's own
//! layer order.

mod frame;
mod material_manager;
mod stats;

pub use frame::FrameView;
pub use material_manager::MaterialManager;
pub use stats::RenderStats;

/// Host render layers. Each material belongs to exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderLayer {
    /// Opaque geometry.
    Solid,
    /// Alpha-tested geometry without mipmaps.
    Cutout,
    /// Alpha-tested geometry with mipmaps.
    CutoutMipped,
    /// Blended geometry.
    Translucent,
}

impl RenderLayer {
    /// All layers, in the usual draw order.
    pub const ALL: [Self; 4] = [
        Self::Solid,
        Self::CutoutMipped,
        Self::Cutout,
        Self::Translucent,
    ];
}
