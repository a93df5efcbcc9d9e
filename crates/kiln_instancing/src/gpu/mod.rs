//! The GPU command sink.
//!
//! The instancing core never talks to a graphics API directly. It issues a
//! small set of commands through [`GpuSink`], always from the render-owning
//! thread. A backend (GL, wgpu, Vulkan) implements the trait; tests use
//! [`RecordingSink`].

mod recording;

pub use recording::{DrawRecord, GpuCommand, RecordingSink};

use crate::mesh::VertexFormat;

/// Backend buffer object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Backend shader program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Backend texture object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// What a buffer is bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex model data.
    Vertex,
    /// Triangle indices into the vertex buffer.
    Index,
    /// Per-instance attribute records.
    Instance,
}

/// Uniforms the instancing core uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Uniform {
    /// View-projection, pre-translated by `origin - camera`.
    ViewProjection,
    /// Camera position relative to the floating origin.
    CameraPosition,
    /// Normal visualisation toggle.
    NormalDebug,
}

/// One instanced draw.
#[derive(Clone, Copy, Debug)]
pub struct InstancedDraw<'a> {
    /// Model vertices.
    pub vertex_buffer: BufferId,
    /// Model triangle indices.
    pub index_buffer: BufferId,
    /// Per-instance records.
    pub instance_buffer: BufferId,
    /// Number of indices to draw per instance.
    pub index_count: u32,
    /// Number of instances.
    pub instance_count: u32,
    /// Layout of `vertex_buffer`.
    pub model_format: &'a VertexFormat,
    /// Layout of `instance_buffer`.
    pub instance_format: &'a VertexFormat,
}

/// Commands the instancing core needs from a graphics backend.
///
/// Implementations are only ever called from the render-owning thread.
pub trait GpuSink {
    /// Creates a buffer of `size` bytes.
    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> BufferId;

    /// Writes `bytes` into `buffer` at `offset`.
    fn upload(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]);

    /// Releases a buffer. Each id is destroyed exactly once.
    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Makes `program` current.
    fn bind_program(&mut self, program: ProgramId);

    /// Sets a matrix uniform on the bound program.
    fn set_uniform_mat4(&mut self, uniform: Uniform, value: &[[f32; 4]; 4]);

    /// Sets a vector uniform on the bound program.
    fn set_uniform_vec3(&mut self, uniform: Uniform, value: [f32; 3]);

    /// Sets a boolean uniform on the bound program.
    fn set_uniform_bool(&mut self, uniform: Uniform, value: bool);

    /// Binds a texture to a texture unit.
    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    /// Issues one instanced, indexed draw.
    fn draw_instanced(&mut self, draw: &InstancedDraw<'_>);
}

/// A GPU release requested from anywhere and run later by the render owner.
pub struct GpuRelease(Box<dyn FnOnce(&mut dyn GpuSink) + Send>);

impl GpuRelease {
    /// Wraps a release operation.
    pub fn new(release: impl FnOnce(&mut dyn GpuSink) + Send + 'static) -> Self {
        Self(Box::new(release))
    }

    /// Runs the release against the sink.
    pub fn run(self, sink: &mut dyn GpuSink) {
        (self.0)(sink);
    }
}

impl std::fmt::Debug for GpuRelease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GpuRelease")
    }
}

/// Queue of pending GPU releases, drained by the render owner once per frame.
pub type ReleaseQueue = kiln_core::RenderWorkQueue<GpuRelease>;

/// Producer handle for [`ReleaseQueue`].
pub type ReleaseSender = kiln_core::RenderWorkSender<GpuRelease>;
