//! Material registry and layer rendering.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::DVec3;
use kiln_core::RenderOwner;
use parking_lot::RwLock;

use super::{FrameView, RenderLayer, RenderStats};
use crate::config::InstancingConfig;
use crate::gpu::{GpuSink, ReleaseSender, Uniform};
use crate::instancing::{
    FloatingOrigin, InstanceData, InstanceMaterial, MaterialSpec, OriginShift, RenderMaterial,
};

/// Every instanced material of one world, grouped by render layer.
///
/// All materials share one floating origin. Materials are created on first
/// request from any thread; rendering and origin checks belong to the render
/// owner.
pub struct MaterialManager {
    layers: RwLock<BTreeMap<RenderLayer, Vec<Arc<dyn RenderMaterial>>>>,
    origin: FloatingOrigin,
    config: InstancingConfig,
    normal_debug: AtomicBool,
    releases: ReleaseSender,
    owner: RenderOwner,
}

impl MaterialManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(config: &InstancingConfig, releases: ReleaseSender, owner: RenderOwner) -> Self {
        Self {
            layers: RwLock::new(BTreeMap::new()),
            origin: FloatingOrigin::new(),
            normal_debug: AtomicBool::new(config.normal_debug),
            config: config.clone(),
            releases,
            owner,
        }
    }

    /// The shared floating origin.
    #[must_use]
    pub fn origin(&self) -> &FloatingOrigin {
        &self.origin
    }

    /// The render-owning thread.
    #[must_use]
    pub const fn owner(&self) -> RenderOwner {
        self.owner
    }

    /// Sender for deferred GPU releases.
    #[must_use]
    pub fn releases(&self) -> &ReleaseSender {
        &self.releases
    }

    /// Toggles normal visualisation for subsequent renders.
    pub fn set_normal_debug(&self, enabled: bool) {
        self.normal_debug.store(enabled, Ordering::Relaxed);
    }

    /// Returns the material named `spec.name` in `layer`, creating it if needed.
    ///
    /// # Panics
    ///
    /// Panics if the name is already registered in `layer` with different
    /// key or record types.
    pub fn material<K, D>(&self, layer: RenderLayer, spec: MaterialSpec) -> Arc<InstanceMaterial<K, D>>
    where
        K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
        D: InstanceData,
    {
        if let Some(existing) = self.find::<K, D>(layer, &spec.name) {
            return existing;
        }

        let mut layers = self.layers.write();
        let materials = layers.entry(layer).or_default();
        // Another thread may have registered it between the lookups.
        if let Some(existing) = materials.iter().find(|m| m.spec().name == spec.name) {
            return Self::downcast(layer, existing);
        }

        tracing::debug!(?layer, material = %spec.name, "material registered");
        let material = Arc::new(InstanceMaterial::new(
            spec,
            self.origin.clone(),
            self.config.instancer,
            self.releases.clone(),
        ));
        materials.push(Arc::clone(&material) as Arc<dyn RenderMaterial>);
        material
    }

    /// Looks up a registered material.
    ///
    /// # Panics
    ///
    /// Panics if the name is registered with different key or record types.
    #[must_use]
    pub fn find<K, D>(&self, layer: RenderLayer, name: &str) -> Option<Arc<InstanceMaterial<K, D>>>
    where
        K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
        D: InstanceData,
    {
        let layers = self.layers.read();
        let existing = layers.get(&layer)?.iter().find(|m| m.spec().name == name)?;
        Some(Self::downcast(layer, existing))
    }

    fn downcast<K, D>(layer: RenderLayer, material: &Arc<dyn RenderMaterial>) -> Arc<InstanceMaterial<K, D>>
    where
        K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
        D: InstanceData,
    {
        match Arc::clone(material).as_any().downcast::<InstanceMaterial<K, D>>() {
            Ok(typed) => typed,
            Err(_) => panic!(
                "material {:?} in {layer:?} was registered with different key or record types",
                material.spec().name,
            ),
        }
    }

    /// Number of materials across all layers.
    #[must_use]
    pub fn material_count(&self) -> usize {
        self.layers.read().values().map(Vec::len).sum()
    }

    /// Recenters the origin if the camera drifted too far.
    ///
    /// Instancers pick the shift up before their next mutation or draw.
    pub fn check_and_shift_origin(&self, camera: DVec3) -> Option<OriginShift> {
        self.owner.assert_owner("MaterialManager::check_and_shift_origin");
        self.origin.follow(camera, &self.config.origin)
    }

    /// Draws every material of `layer`.
    ///
    /// Materials with nothing cached, or whose instancers have no instances or
    /// no geometry, are skipped without binding their program.
    ///
    /// # Panics
    ///
    /// Panics if called off the render-owning thread.
    pub fn render(&self, layer: RenderLayer, view: &FrameView, sink: &mut dyn GpuSink) -> RenderStats {
        self.owner.assert_owner("MaterialManager::render");

        let mut stats = RenderStats::default();
        let materials = match self.layers.read().get(&layer) {
            Some(materials) => materials.clone(),
            None => return stats,
        };

        let origin = self.origin.position();
        let view_projection = view.origin_view_projection(origin).to_cols_array_2d();
        let camera = view.camera_relative(origin).to_array();
        let normal_debug = self.normal_debug.load(Ordering::Relaxed);

        for material in &materials {
            if material.is_empty() || material.nothing_to_render() {
                stats.materials_skipped += 1;
                continue;
            }
            sink.bind_program(material.spec().program);
            sink.set_uniform_mat4(Uniform::ViewProjection, &view_projection);
            sink.set_uniform_vec3(Uniform::CameraPosition, camera);
            sink.set_uniform_bool(Uniform::NormalDebug, normal_debug);
            material.draw(sink, &mut stats);
            stats.materials_drawn += 1;
        }

        tracing::trace!(
            ?layer,
            draw_calls = stats.draw_calls,
            instances = stats.instances,
            "layer rendered",
        );
        stats
    }

    /// Drops every material and schedules all GPU releases.
    pub fn delete(&self) {
        let layers = std::mem::take(&mut *self.layers.write());
        for material in layers.into_values().flatten() {
            material.delete();
        }
    }
}

impl fmt::Debug for MaterialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialManager")
            .field("materials", &self.material_count())
            .field("origin", &self.origin.position())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
