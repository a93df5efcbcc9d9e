//! # Host Integration Layer
//!
//! Connects the host's scene objects to instanced rendering.
//!
//! ```text
//! scene object ──► InstanceManager ──► InstanceFactory ──► InstanceMaterial::get
//!                        │                                       │
//!                        │                                       ▼
//!                        └──── owns ObjectInstance ──► records in an Instancer
//!
//! each frame:  run releases ─► shift origin ─► begin_frame ─► render per layer
//! ```
//!
//! ## Rules
//!
//! 1. Only the render-owning thread runs GPU work; everyone else enqueues.
//! 2. `begin_frame` completes before any draw of the same frame.
//! 3. The origin check happens once per frame, before the first draw.

mod dispatcher;
mod instance_manager;
mod scene;

pub use dispatcher::{InstancedRenderDispatcher, WorldRenderers};
pub use instance_manager::InstanceManager;
pub use scene::{InstanceFactory, ModelInstance, ObjectInstance, SceneObject, SceneSource};
