//! Instanced rendering of repeated models.
//!
//! ## Key Concepts
//!
//! - **Instancer**: one packed model mesh plus a dense array of per-instance
//!   records, mirrored to a GPU buffer that grows geometrically.
//! - **InstanceMaterial**: the per-material cache of instancers, keyed by
//!   model. Each key is built at most once.
//! - **Floating origin**: records are stored relative to an integer origin
//!   that follows the camera, and shifted lazily when it moves.
//! - **Deferred release**: GPU buffers are only destroyed by the render owner;
//!   other threads enqueue a [`GpuRelease`](crate::gpu::GpuRelease).

mod buffer;
mod instance_data;
mod instancer;
mod material;
mod origin;

pub use buffer::{DirtyRange, InstanceBuffer};
pub use instance_data::{InstanceData, ModelData, OrientedData};
pub use instancer::{InstanceHandle, Instancer};
pub use material::{InstanceMaterial, MaterialSpec, RenderMaterial, SharedInstancer};
pub use origin::{FloatingOrigin, OriginShift, OriginSnapshot};
