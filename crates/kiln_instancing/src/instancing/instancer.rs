//! One model mesh, many placements.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use glam::{DVec3, Vec3};
use kiln_core::{RenderOwner, SlotHandle, SlotPool};

use super::buffer::{DirtyRange, InstanceBuffer};
use super::instance_data::InstanceData;
use super::origin::{FloatingOrigin, OriginSnapshot};
use crate::config::InstancerConfig;
use crate::error::{InstanceError, InstanceResult};
use crate::gpu::{BufferId, BufferKind, GpuSink, InstancedDraw};
use crate::mesh::{MeshBuffer, VertexFormat};

static NEXT_INSTANCER_ID: AtomicU32 = AtomicU32::new(1);

/// Handle to one instance record.
///
/// Handles are only valid on the instancer that issued them, and only until
/// the instance is removed or the instancer is cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    instancer: u32,
    slot: SlotHandle,
}

impl InstanceHandle {
    /// Id of the issuing instancer.
    #[inline]
    #[must_use]
    pub const fn instancer(&self) -> u32 {
        self.instancer
    }
}

#[derive(Debug, Clone, Copy)]
struct GpuMesh {
    vertex: BufferId,
    index: BufferId,
}

/// The instances of one mesh.
///
/// Instance records are stored densely; removing one moves the last record
/// into its place. The GPU mirror is created on first draw and only touched
/// records are re-uploaded. Drawing and deleting belong to the render owner;
/// records may be edited from anywhere.
#[derive(Debug)]
pub struct Instancer<D: InstanceData> {
    id: u32,
    mesh: Arc<MeshBuffer>,
    instance_format: VertexFormat,
    instances: SlotPool<D>,
    dirty: DirtyRange,
    origin: FloatingOrigin,
    anchor: OriginSnapshot,
    policy: InstancerConfig,
    gpu_mesh: Option<GpuMesh>,
    gpu_instances: InstanceBuffer,
    owner: RenderOwner,
    deleted: bool,
}

impl<D: InstanceData> Instancer<D> {
    /// Creates an instancer drawing `mesh`, positioned relative to `origin`.
    /// Its GPU objects live on `owner`.
    #[must_use]
    pub fn new(
        mesh: Arc<MeshBuffer>,
        origin: FloatingOrigin,
        policy: InstancerConfig,
        owner: RenderOwner,
    ) -> Self {
        let instance_format = D::format();
        debug_assert_eq!(instance_format.stride(), std::mem::size_of::<D>());
        let stride = std::mem::size_of::<D>();

        Self {
            id: NEXT_INSTANCER_ID.fetch_add(1, Ordering::Relaxed),
            mesh,
            instance_format,
            instances: SlotPool::new(),
            dirty: DirtyRange::default(),
            anchor: origin.snapshot(),
            origin,
            policy,
            gpu_mesh: None,
            gpu_instances: InstanceBuffer::new(stride),
            owner,
            deleted: false,
        }
    }

    /// Process-unique id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// The model mesh.
    #[inline]
    #[must_use]
    pub fn mesh(&self) -> &Arc<MeshBuffer> {
        &self.mesh
    }

    /// Layout of one instance record.
    #[inline]
    #[must_use]
    pub fn instance_format(&self) -> &VertexFormat {
        &self.instance_format
    }

    /// Number of live instances.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True if there is nothing to draw.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// True once [`Instancer::delete`] ran.
    #[inline]
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Live records, in draw order.
    #[must_use]
    pub fn records(&self) -> &[D] {
        self.instances.as_slice()
    }

    /// The shared floating origin.
    #[must_use]
    pub fn origin(&self) -> &FloatingOrigin {
        &self.origin
    }

    /// True if the origin moved since records were last re-expressed.
    #[must_use]
    pub fn needs_origin_refresh(&self) -> bool {
        self.origin.generation() != self.anchor.generation
    }

    /// Converts a world position to the coordinates records are stored in.
    pub fn relative(&mut self, world: DVec3) -> Vec3 {
        self.sync_origin();
        (world - self.anchor.position.as_dvec3()).as_vec3()
    }

    /// Adds a default record.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Deleted`] after [`Instancer::delete`].
    pub fn add(&mut self) -> InstanceResult<InstanceHandle> {
        self.add_with(D::default())
    }

    /// Adds `data` as a new record.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Deleted`] after [`Instancer::delete`].
    pub fn add_with(&mut self, data: D) -> InstanceResult<InstanceHandle> {
        self.ensure_live()?;
        self.sync_origin();

        let slot = self.instances.insert(data);
        self.dirty.mark(self.instances.len() - 1);
        Ok(InstanceHandle {
            instancer: self.id,
            slot,
        })
    }

    /// Reads a record.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale, foreign, or the instancer is deleted.
    pub fn get(&self, handle: InstanceHandle) -> InstanceResult<&D> {
        let slot = self.check(handle)?;
        self.instances
            .get(slot)
            .ok_or(InstanceError::StaleHandle(handle))
    }

    /// Mutable access to a record; marks it for upload.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale, foreign, or the instancer is deleted.
    pub fn get_mut(&mut self, handle: InstanceHandle) -> InstanceResult<&mut D> {
        let slot = self.check(handle)?;
        self.sync_origin();

        let Some(index) = self.instances.dense_index(slot) else {
            return Err(self.stale(handle));
        };
        self.dirty.mark(index);
        self.instances
            .get_mut(slot)
            .ok_or(InstanceError::StaleHandle(handle))
    }

    /// Overwrites a record.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale, foreign, or the instancer is deleted.
    pub fn update(&mut self, handle: InstanceHandle, data: D) -> InstanceResult<()> {
        *self.get_mut(handle)? = data;
        Ok(())
    }

    /// Removes a record, returning it. The handle becomes stale.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale, foreign, or the instancer is deleted.
    pub fn remove(&mut self, handle: InstanceHandle) -> InstanceResult<D> {
        let slot = self.check(handle)?;
        let Some(removed) = self.instances.remove(slot) else {
            return Err(self.stale(handle));
        };
        if removed.moved {
            self.dirty.mark(removed.dense_index);
        }
        Ok(removed.value)
    }

    /// Drops every record, keeping the mesh and GPU buffers. All handles
    /// become stale.
    pub fn clear(&mut self) {
        self.instances.clear();
        self.dirty.reset();
    }

    /// Releases GPU resources. Idempotent; the instancer is unusable after.
    ///
    /// # Panics
    ///
    /// Panics if called off the render-owning thread.
    #[track_caller]
    pub fn delete(&mut self, sink: &mut dyn GpuSink) {
        self.owner.assert_owner("Instancer::delete");
        if self.deleted {
            tracing::debug!(instancer = self.id, "instancer already deleted");
            return;
        }
        if let Some(mesh) = self.gpu_mesh.take() {
            sink.destroy_buffer(mesh.vertex);
            sink.destroy_buffer(mesh.index);
        }
        self.gpu_instances.release(sink);
        self.instances.clear();
        self.dirty.reset();
        self.deleted = true;
    }

    /// Uploads pending changes and issues one instanced draw.
    ///
    /// Returns the number of instances drawn, or `None` if nothing was drawn.
    ///
    /// # Panics
    ///
    /// Panics if called off the render-owning thread.
    #[track_caller]
    pub fn render(&mut self, sink: &mut dyn GpuSink) -> Option<u32> {
        self.owner.assert_owner("Instancer::render");
        if self.deleted || self.instances.is_empty() || self.mesh.is_empty() {
            return None;
        }
        self.sync_origin();

        let mesh = self.upload_mesh(sink);
        let dirty = self.dirty.take(self.instances.len());
        let instance_buffer = self.gpu_instances.sync(
            sink,
            bytemuck::cast_slice(self.instances.as_slice()),
            dirty,
            &self.policy,
        );

        let instance_count = self.instances.len() as u32;
        sink.draw_instanced(&InstancedDraw {
            vertex_buffer: mesh.vertex,
            index_buffer: mesh.index,
            instance_buffer,
            index_count: self.mesh.index_count() as u32,
            instance_count,
            model_format: self.mesh.format(),
            instance_format: &self.instance_format,
        });
        Some(instance_count)
    }

    fn upload_mesh(&mut self, sink: &mut dyn GpuSink) -> GpuMesh {
        if let Some(mesh) = self.gpu_mesh {
            return mesh;
        }
        let vertices = self.mesh.vertex_bytes();
        let indices: &[u8] = bytemuck::cast_slice(self.mesh.indices());

        let vertex = sink.create_buffer(BufferKind::Vertex, vertices.len());
        sink.upload(vertex, 0, vertices);
        let index = sink.create_buffer(BufferKind::Index, indices.len());
        sink.upload(index, 0, indices);

        let mesh = GpuMesh { vertex, index };
        self.gpu_mesh = Some(mesh);
        mesh
    }

    /// Re-expresses every record against the current origin.
    fn sync_origin(&mut self) {
        let current = self.origin.snapshot();
        if current.generation == self.anchor.generation {
            return;
        }
        let delta = (current.position - self.anchor.position).as_vec3();
        if delta != Vec3::ZERO {
            for record in self.instances.as_mut_slice() {
                record.shift_origin(delta);
            }
            self.dirty.mark_all(self.instances.len());
        }
        self.anchor = current;
    }

    fn ensure_live(&self) -> InstanceResult<()> {
        if self.deleted {
            Err(InstanceError::Deleted(self.id))
        } else {
            Ok(())
        }
    }

    fn check(&self, handle: InstanceHandle) -> InstanceResult<SlotHandle> {
        self.ensure_live()?;
        if handle.instancer != self.id {
            return Err(InstanceError::ForeignHandle {
                handle,
                owner: handle.instancer,
                instancer: self.id,
            });
        }
        Ok(handle.slot)
    }

    fn stale(&self, handle: InstanceHandle) -> InstanceError {
        tracing::warn!(instancer = self.id, ?handle, "stale instance handle used");
        InstanceError::StaleHandle(handle)
    }
}
