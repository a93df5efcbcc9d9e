//! In-memory command sink.
//!
//! Records every command, mirrors buffer contents, and asserts on the
//! mistakes a real driver would turn into corruption: destroying a buffer
//! twice, or writing past its end.

use std::collections::HashMap;

use super::{BufferId, BufferKind, GpuSink, InstancedDraw, ProgramId, TextureId, Uniform};

/// A draw as recorded by [`RecordingSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRecord {
    /// Model vertices.
    pub vertex_buffer: BufferId,
    /// Model triangle indices.
    pub index_buffer: BufferId,
    /// Per-instance records.
    pub instance_buffer: BufferId,
    /// Indices per instance.
    pub index_count: u32,
    /// Instances drawn.
    pub instance_count: u32,
    /// Model vertex stride in bytes.
    pub model_stride: usize,
    /// Instance record stride in bytes.
    pub instance_stride: usize,
}

/// One recorded command.
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCommand {
    /// A buffer was created.
    CreateBuffer {
        /// Assigned id.
        buffer: BufferId,
        /// Binding kind.
        kind: BufferKind,
        /// Size in bytes.
        size: usize,
    },
    /// Bytes were written to a buffer.
    Upload {
        /// Target buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: usize,
        /// Byte count.
        len: usize,
    },
    /// A buffer was destroyed.
    DestroyBuffer(BufferId),
    /// A program was bound.
    BindProgram(ProgramId),
    /// A matrix uniform was set.
    UniformMat4(Uniform, [[f32; 4]; 4]),
    /// A vector uniform was set.
    UniformVec3(Uniform, [f32; 3]),
    /// A boolean uniform was set.
    UniformBool(Uniform, bool),
    /// A texture was bound.
    BindTexture {
        /// Texture unit.
        unit: u32,
        /// Bound texture.
        texture: TextureId,
    },
    /// An instanced draw was issued.
    Draw(DrawRecord),
}

#[derive(Debug)]
struct BufferRecord {
    kind: BufferKind,
    contents: Vec<u8>,
}

/// A [`GpuSink`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Vec<GpuCommand>,
    buffers: HashMap<BufferId, BufferRecord>,
    next_buffer: u32,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All commands recorded so far.
    #[must_use]
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Forgets recorded commands. Buffer state is kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Recorded draws, in order.
    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.commands.iter().filter_map(|command| match command {
            GpuCommand::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    /// Number of recorded draws.
    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    /// Number of commands matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&GpuCommand) -> bool) -> usize {
        self.commands.iter().filter(|command| predicate(command)).count()
    }

    /// Number of buffers created and not yet destroyed.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live buffers of one kind.
    #[must_use]
    pub fn live_buffers_of(&self, kind: BufferKind) -> usize {
        self.buffers.values().filter(|record| record.kind == kind).count()
    }

    /// Current contents of a live buffer.
    #[must_use]
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|record| record.contents.as_slice())
    }
}

impl GpuSink for RecordingSink {
    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> BufferId {
        let buffer = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(
            buffer,
            BufferRecord {
                kind,
                contents: vec![0; size],
            },
        );
        self.commands.push(GpuCommand::CreateBuffer { buffer, kind, size });
        buffer
    }

    fn upload(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]) {
        let record = self
            .buffers
            .get_mut(&buffer)
            .unwrap_or_else(|| panic!("upload to dead buffer {buffer:?}"));
        let end = offset + bytes.len();
        assert!(
            end <= record.contents.len(),
            "upload of {} bytes at {offset} overflows {buffer:?} ({} bytes)",
            bytes.len(),
            record.contents.len(),
        );
        record.contents[offset..end].copy_from_slice(bytes);
        self.commands.push(GpuCommand::Upload {
            buffer,
            offset,
            len: bytes.len(),
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        assert!(
            self.buffers.remove(&buffer).is_some(),
            "buffer {buffer:?} destroyed twice or never created",
        );
        self.commands.push(GpuCommand::DestroyBuffer(buffer));
    }

    fn bind_program(&mut self, program: ProgramId) {
        self.commands.push(GpuCommand::BindProgram(program));
    }

    fn set_uniform_mat4(&mut self, uniform: Uniform, value: &[[f32; 4]; 4]) {
        self.commands.push(GpuCommand::UniformMat4(uniform, *value));
    }

    fn set_uniform_vec3(&mut self, uniform: Uniform, value: [f32; 3]) {
        self.commands.push(GpuCommand::UniformVec3(uniform, value));
    }

    fn set_uniform_bool(&mut self, uniform: Uniform, value: bool) {
        self.commands.push(GpuCommand::UniformBool(uniform, value));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.commands.push(GpuCommand::BindTexture { unit, texture });
    }

    fn draw_instanced(&mut self, draw: &InstancedDraw<'_>) {
        self.commands.push(GpuCommand::Draw(DrawRecord {
            vertex_buffer: draw.vertex_buffer,
            index_buffer: draw.index_buffer,
            instance_buffer: draw.instance_buffer,
            index_count: draw.index_count,
            instance_count: draw.instance_count,
            model_stride: draw.model_format.stride(),
            instance_stride: draw.instance_format.stride(),
        }));
    }
}
