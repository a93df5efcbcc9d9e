//! Per-material cache of instancers, keyed by model.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use super::instance_data::InstanceData;
use super::instancer::Instancer;
use super::origin::FloatingOrigin;
use crate::config::InstancerConfig;
use crate::error::{BuildError, BuildResult, RasterizeError};
use crate::gpu::{GpuRelease, GpuSink, ProgramId, ReleaseSender};
use crate::mesh::{
    MeshBufferBuilder, MeshRasterizer, ModelKey, Orientation, RasterizedMesh, VertexFormat,
};
use crate::pipeline::RenderStats;

/// An instancer shared between the cache and the objects placing instances.
pub type SharedInstancer<D> = Arc<Mutex<Instancer<D>>>;

/// What a material draws with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaterialSpec {
    /// Unique name within a render layer.
    pub name: String,
    /// Shader program.
    pub program: ProgramId,
    /// Layout model meshes are packed into.
    pub model_format: VertexFormat,
}

impl MaterialSpec {
    /// Creates a spec.
    pub fn new(name: impl Into<String>, program: ProgramId, model_format: VertexFormat) -> Self {
        Self {
            name: name.into(),
            program,
            model_format,
        }
    }
}

/// Cache of instancers for one material.
///
/// Each key is built at most once: the cache lock is held while a missing
/// mesh is rasterized, so concurrent first requests for the same key wait
/// for the first build. Suppliers must not call back into the same material.
pub struct InstanceMaterial<K, D: InstanceData> {
    spec: MaterialSpec,
    builder: MeshBufferBuilder,
    origin: FloatingOrigin,
    policy: InstancerConfig,
    releases: ReleaseSender,
    models: Mutex<HashMap<K, SharedInstancer<D>>>,
}

impl<K, D> InstanceMaterial<K, D>
where
    K: Eq + Hash + Clone + fmt::Debug,
    D: InstanceData,
{
    /// Creates an empty cache.
    #[must_use]
    pub fn new(
        spec: MaterialSpec,
        origin: FloatingOrigin,
        policy: InstancerConfig,
        releases: ReleaseSender,
    ) -> Self {
        Self {
            builder: MeshBufferBuilder::new(spec.model_format.clone()),
            spec,
            origin,
            policy,
            releases,
            models: Mutex::new(HashMap::new()),
        }
    }

    /// What this material draws with.
    #[must_use]
    pub fn spec(&self) -> &MaterialSpec {
        &self.spec
    }

    /// Returns the instancer for `key`, building it from `supplier` on first use.
    ///
    /// # Errors
    ///
    /// A failed build is returned and nothing is cached, so the next request
    /// for the key tries again.
    pub fn get<F, E>(&self, key: K, supplier: F) -> BuildResult<SharedInstancer<D>>
    where
        F: FnOnce() -> Result<RasterizedMesh, E>,
        E: Into<RasterizeError>,
    {
        let mut models = self.models.lock();
        if let Some(instancer) = models.get(&key) {
            return Ok(Arc::clone(instancer));
        }

        let built = supplier()
            .map_err(|e| BuildError::Rasterize(e.into()))
            .and_then(|mesh| self.builder.build(&mesh));
        let mesh = match built {
            Ok(mesh) => mesh,
            Err(error) => {
                tracing::warn!(material = %self.spec.name, ?key, %error, "model build failed");
                return Err(error);
            }
        };

        tracing::debug!(
            material = %self.spec.name,
            ?key,
            vertices = mesh.vertex_count(),
            "built instancer",
        );
        let instancer = Arc::new(Mutex::new(Instancer::new(
            Arc::new(mesh),
            self.origin.clone(),
            self.policy,
            self.releases.owner(),
        )));
        models.insert(key, Arc::clone(&instancer));
        Ok(instancer)
    }

    /// Returns the cached instancer for `key` without building.
    #[must_use]
    pub fn cached(&self, key: &K) -> Option<SharedInstancer<D>> {
        self.models.lock().get(key).cloned()
    }

    /// True if `key` has an instancer.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.models.lock().contains_key(key)
    }

    /// Number of cached instancers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.lock().len()
    }

    /// True if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.lock().is_empty()
    }

    /// Visits every instancer.
    pub fn for_each(&self, mut visit: impl FnMut(&mut Instancer<D>)) {
        for instancer in self.models.lock().values() {
            visit(&mut *instancer.lock());
        }
    }

    /// True if instancers exist but none would draw: each is either without
    /// instances or holds an empty mesh.
    #[must_use]
    pub fn nothing_to_render(&self) -> bool {
        let models = self.models.lock();
        !models.is_empty()
            && models.values().all(|instancer| {
                let instancer = instancer.lock();
                instancer.is_empty() || instancer.mesh().is_empty()
            })
    }

    /// Empties every instancer. Meshes and GPU buffers stay cached.
    pub fn clear(&self) {
        self.for_each(Instancer::clear);
    }

    /// Drops `key` from the cache and schedules its GPU release.
    ///
    /// Safe from any thread; the release runs on the render owner.
    pub fn evict(&self, key: &K) -> bool {
        let removed = self.models.lock().remove(key);
        match removed {
            Some(instancer) => {
                self.schedule_release(instancer);
                true
            }
            None => false,
        }
    }

    /// Drops every instancer and schedules their GPU release.
    pub fn delete(&self) {
        let drained: Vec<_> = self.models.lock().drain().map(|(_, v)| v).collect();
        if !drained.is_empty() {
            tracing::debug!(material = %self.spec.name, count = drained.len(), "material deleted");
        }
        for instancer in drained {
            self.schedule_release(instancer);
        }
    }

    fn schedule_release(&self, instancer: SharedInstancer<D>) {
        self.releases
            .enqueue(GpuRelease::new(move |sink| instancer.lock().delete(sink)));
    }
}

impl<M, D> InstanceMaterial<ModelKey<M>, D>
where
    M: Eq + Hash + Clone + fmt::Debug,
    D: InstanceData,
{
    /// Returns the instancer for `model`, rasterizing it on first use.
    ///
    /// With an orientation the model is rotated about the block centre before
    /// baking, so each orientation gets its own mesh.
    ///
    /// # Errors
    ///
    /// Returns the build error if rasterization or packing fails.
    pub fn get_model<R>(
        &self,
        rasterizer: &R,
        model: M,
        orientation: Option<Orientation>,
    ) -> BuildResult<SharedInstancer<D>>
    where
        R: MeshRasterizer<M> + ?Sized,
    {
        let key = ModelKey { model, orientation };
        let transform = key.transform();
        let model = key.model.clone();
        self.get(key, || rasterizer.rasterize(&model, &transform))
    }
}

impl<K, D: InstanceData> fmt::Debug for InstanceMaterial<K, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceMaterial")
            .field("spec", &self.spec)
            .field("models", &self.models.lock().len())
            .finish_non_exhaustive()
    }
}

/// Type-erased view of a material, as held by a material manager.
pub trait RenderMaterial: Send + Sync {
    /// What the material draws with.
    fn spec(&self) -> &MaterialSpec;

    /// True if nothing is cached.
    fn is_empty(&self) -> bool;

    /// True if instancers exist but none would draw.
    fn nothing_to_render(&self) -> bool;

    /// Draws every non-empty instancer.
    fn draw(&self, sink: &mut dyn GpuSink, stats: &mut RenderStats);

    /// Drops and schedules release of every instancer.
    fn delete(&self);

    /// Upcast for typed lookups.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<K, D> RenderMaterial for InstanceMaterial<K, D>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
    D: InstanceData,
{
    fn spec(&self) -> &MaterialSpec {
        &self.spec
    }

    fn is_empty(&self) -> bool {
        Self::is_empty(self)
    }

    fn nothing_to_render(&self) -> bool {
        Self::nothing_to_render(self)
    }

    fn draw(&self, sink: &mut dyn GpuSink, stats: &mut RenderStats) {
        self.for_each(|instancer| {
            if let Some(instances) = instancer.render(sink) {
                stats.record_draw(instances);
            }
        });
    }

    fn delete(&self) {
        Self::delete(self);
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use glam::Mat4;
    use kiln_core::RenderOwner;

    use super::*;
    use crate::gpu::{ReleaseQueue, RecordingSink};
    use crate::instancing::ModelData;
    use crate::mesh::RasterVertex;

    fn unit_quad() -> RasterizedMesh {
        RasterizedMesh::from_quads([[
            RasterVertex::new([0.0, 0.0, 0.0], [0, 127, 0], [0.0, 0.0]),
            RasterVertex::new([1.0, 0.0, 0.0], [0, 127, 0], [1.0, 0.0]),
            RasterVertex::new([1.0, 0.0, 1.0], [0, 127, 0], [1.0, 1.0]),
            RasterVertex::new([0.0, 0.0, 1.0], [0, 127, 0], [0.0, 1.0]),
        ]])
    }

    fn material(queue: &ReleaseQueue) -> InstanceMaterial<&'static str, ModelData> {
        InstanceMaterial::new(
            MaterialSpec::new("solid", ProgramId(1), VertexFormat::block()),
            FloatingOrigin::new(),
            InstancerConfig::default(),
            queue.sender(),
        )
    }

    #[test]
    fn test_get_builds_once() {
        let queue = ReleaseQueue::new(RenderOwner::current());
        let material = material(&queue);
        let builds = AtomicUsize::new(0);
        let supply = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RasterizeError>(unit_quad())
        };

        let a = material.get("shaft", supply).unwrap();
        let b = material.get("shaft", supply).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let queue = ReleaseQueue::new(RenderOwner::current());
        let material = material(&queue);

        let err = material
            .get("broken", || Err::<RasterizedMesh, _>("no such model"))
            .unwrap_err();
        assert!(matches!(err, BuildError::Rasterize(_)));
        assert!(!material.contains(&"broken"));

        assert!(material.get("broken", || Ok::<_, RasterizeError>(unit_quad())).is_ok());
        assert_eq!(material.len(), 1);
    }

    #[test]
    fn test_nothing_to_render() {
        let queue = ReleaseQueue::new(RenderOwner::current());
        let material = material(&queue);
        assert!(!material.nothing_to_render());

        let instancer = material
            .get("gear", || Ok::<_, RasterizeError>(unit_quad()))
            .unwrap();
        assert!(material.nothing_to_render());

        instancer.lock().add().unwrap();
        assert!(!material.nothing_to_render());

        material.clear();
        assert!(material.nothing_to_render());
        assert_eq!(material.len(), 1);
    }

    #[test]
    fn test_empty_mesh_counts_as_nothing_to_render() {
        let queue = ReleaseQueue::new(RenderOwner::current());
        let material = material(&queue);
        let hollow = material
            .get("air", || Ok::<_, RasterizeError>(RasterizedMesh::default()))
            .unwrap();
        hollow.lock().add().unwrap();
        assert!(material.nothing_to_render());

        let solid = material
            .get("stone", || Ok::<_, RasterizeError>(unit_quad()))
            .unwrap();
        solid.lock().add().unwrap();
        assert!(!material.nothing_to_render());
    }

    #[test]
    fn test_delete_defers_release() {
        let queue = ReleaseQueue::new(RenderOwner::current());
        let material = material(&queue);
        let mut sink = RecordingSink::new();

        let instancer = material
            .get("belt", || Ok::<_, RasterizeError>(unit_quad()))
            .unwrap();
        instancer.lock().add().unwrap();
        instancer.lock().render(&mut sink);
        assert_eq!(sink.live_buffers(), 3);

        material.delete();
        material.delete();
        assert!(material.is_empty());
        assert_eq!(queue.pending(), 1);
        assert_eq!(sink.live_buffers(), 3);

        queue.run_all(|release| release.run(&mut sink));
        assert_eq!(sink.live_buffers(), 0);
        assert!(instancer.lock().is_deleted());
    }

    struct CountingRasterizer(AtomicUsize);

    impl MeshRasterizer<u32> for CountingRasterizer {
        fn rasterize(&self, _model: &u32, transform: &Mat4) -> Result<RasterizedMesh, RasterizeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            let vertices = unit_quad()
                .vertices()
                .iter()
                .map(|v| {
                    let p = transform.transform_point3(v.position.into());
                    RasterVertex::new(p.to_array(), v.normal, v.uv)
                })
                .collect();
            Ok(RasterizedMesh::new(vertices))
        }
    }

    #[test]
    fn test_get_model_keys_by_orientation() {
        let queue = ReleaseQueue::new(RenderOwner::current());
        let material: InstanceMaterial<ModelKey<u32>, ModelData> = InstanceMaterial::new(
            MaterialSpec::new("cutout", ProgramId(2), VertexFormat::block()),
            FloatingOrigin::new(),
            InstancerConfig::default(),
            queue.sender(),
        );
        let rasterizer = CountingRasterizer(AtomicUsize::new(0));

        let up = material.get_model(&rasterizer, 7, Some(Orientation::Up)).unwrap();
        material.get_model(&rasterizer, 7, Some(Orientation::Up)).unwrap();
        let down = material.get_model(&rasterizer, 7, Some(Orientation::Down)).unwrap();

        assert!(!Arc::ptr_eq(&up, &down));
        assert_eq!(rasterizer.0.load(Ordering::SeqCst), 2);
        assert!(material.contains(&ModelKey::oriented(7, Orientation::Down)));
        assert!(!material.evict(&ModelKey::new(7)));
        assert!(material.evict(&ModelKey::oriented(7, Orientation::Up)));
        assert_eq!(queue.pending(), 1);
    }
}
