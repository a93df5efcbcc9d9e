//! Model meshes: vertex layouts, the rasterizer boundary, and buffer packing.
//!
//! ```text
//! MeshRasterizer ──► RasterizedMesh (quads) ──► MeshBufferBuilder ──► MeshBuffer
//!                                                    ▲
//!                                               VertexFormat
//! ```

mod builder;
mod format;
mod raster;

pub use builder::{quad_indices, MeshBuffer, MeshBufferBuilder, INDICES_PER_QUAD};
pub use format::{ComponentType, Semantic, VertexAttribute, VertexFormat};
pub use raster::{MeshRasterizer, ModelKey, Orientation, RasterVertex, RasterizedMesh};
