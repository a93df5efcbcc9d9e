//! # Overlay Effects
//!
//! Render features that only sometimes have work. They build their
//! instancing state on first use and release it on world reload.

mod crumbling;

pub use crumbling::{
    CrumblingRenderer, StageTextures, BASE_TEXTURE_UNIT, BREAKING_TEXTURE_UNIT, MAX_STAGE,
};
