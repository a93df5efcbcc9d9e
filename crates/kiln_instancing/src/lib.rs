//! # KILN Instancing
//!
//! Draws many objects that share a model mesh with one instanced draw per
//! mesh:
//! - Model meshes are rasterized and packed once per structural key
//! - Per-instance records live in dense arrays, re-uploaded only where dirty
//! - Records are stored relative to a floating origin that follows the camera
//! - GPU buffers are released only by the render-owning thread
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           PER WORLD                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  InstanceManager ──► InstanceFactory ──► InstanceMaterial::get   │
//! │        │                                        │                │
//! │        ▼                                        ▼                │
//! │  ObjectInstance ──── handles ────────────► Instancer             │
//! │                                                 │                │
//! │  MaterialManager::render(layer) ──► GpuSink ◄───┘                │
//! └──────────────────────────────────────────────────────────────────┘
//!            ▲ releases from any thread: ReleaseQueue ─► render owner
//! ```
//!
//! ## Example
//!
//! ```rust
//! use kiln_core::RenderOwner;
//! use kiln_instancing::{
//!     FrameView, InstancingConfig, MaterialManager, MaterialSpec, ModelData, ProgramId,
//!     RasterVertex, RasterizedMesh, RasterizeError, RecordingSink, ReleaseQueue, RenderLayer,
//!     VertexFormat,
//! };
//!
//! let queue = ReleaseQueue::new(RenderOwner::current());
//! let manager = MaterialManager::new(&InstancingConfig::default(), queue.sender(), queue.owner());
//! let material = manager.material::<&str, ModelData>(
//!     RenderLayer::Solid,
//!     MaterialSpec::new("solid", ProgramId(1), VertexFormat::block()),
//! );
//!
//! let quad = || -> Result<RasterizedMesh, RasterizeError> {
//!     let v = |x: f32, z: f32| RasterVertex::new([x, 0.0, z], [0, 127, 0], [x, z]);
//!     Ok(RasterizedMesh::from_quads([[v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0)]]))
//! };
//! let instancer = material.get("slab", quad).unwrap();
//! instancer.lock().add().unwrap();
//!
//! let mut sink = RecordingSink::new();
//! let stats = manager.render(RenderLayer::Solid, &FrameView::at(glam::DVec3::ZERO), &mut sink);
//! assert_eq!(stats.draw_calls, 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod effects;
pub mod error;
pub mod gpu;
pub mod instancing;
pub mod integration;
pub mod mesh;
pub mod pipeline;
pub mod transform;

pub use config::{InstancerConfig, InstancingConfig, OriginConfig, UpdateConfig};
pub use error::{
    BuildError, BuildResult, ConfigError, ConfigResult, InstanceError, InstanceResult,
    RasterizeError,
};
pub use gpu::{
    BufferId, BufferKind, GpuRelease, GpuSink, InstancedDraw, ProgramId, RecordingSink,
    ReleaseQueue, ReleaseSender, TextureId, Uniform,
};
pub use instancing::{
    FloatingOrigin, InstanceData, InstanceHandle, InstanceMaterial, Instancer, MaterialSpec,
    ModelData, OrientedData, OriginShift, SharedInstancer,
};
pub use mesh::{
    MeshBuffer, MeshBufferBuilder, MeshRasterizer, ModelKey, Orientation, RasterVertex,
    RasterizedMesh, VertexFormat,
};
pub use pipeline::{FrameView, MaterialManager, RenderLayer, RenderStats};
pub use transform::TransformStack;

// === HOST INTEGRATION ===
pub use effects::{CrumblingRenderer, StageTextures};
pub use integration::{
    InstanceFactory, InstanceManager, InstancedRenderDispatcher, ModelInstance, ObjectInstance,
    SceneObject, SceneSource,
};
