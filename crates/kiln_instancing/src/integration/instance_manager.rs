//! Object lifecycle tracking.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use glam::DVec3;

use super::scene::{InstanceFactory, ObjectInstance, SceneObject, SceneSource};
use crate::config::{InstancingConfig, UpdateConfig};
use crate::pipeline::{FrameView, MaterialManager};

/// Tracks which instances each live scene object owns in one material manager.
///
/// Additions, removals, and updates can be applied immediately or queued;
/// queued work is coalesced and applied in [`InstanceManager::begin_frame`]
/// (and updates also in [`InstanceManager::tick`]).
pub struct InstanceManager<T: SceneObject> {
    materials: Arc<MaterialManager>,
    factory: Arc<dyn InstanceFactory<T>>,
    instances: HashMap<T::Id, Box<dyn ObjectInstance<T>>>,
    tickable: HashSet<T::Id>,
    dynamic: HashSet<T::Id>,
    queued_additions: Vec<T::Id>,
    queued_removals: HashSet<T::Id>,
    queued_updates: HashSet<T::Id>,
    updates: UpdateConfig,
    enabled: bool,
    ticks: u64,
    frames: u64,
}

impl<T: SceneObject> InstanceManager<T> {
    /// Creates a manager placing instances in `materials`.
    pub fn new(
        materials: Arc<MaterialManager>,
        factory: Arc<dyn InstanceFactory<T>>,
        config: &InstancingConfig,
    ) -> Self {
        Self {
            materials,
            factory,
            instances: HashMap::new(),
            tickable: HashSet::new(),
            dynamic: HashSet::new(),
            queued_additions: Vec::new(),
            queued_removals: HashSet::new(),
            queued_updates: HashSet::new(),
            updates: config.updates,
            enabled: config.enabled,
            ticks: 0,
            frames: 0,
        }
    }

    /// The material manager instances live in.
    #[must_use]
    pub fn materials(&self) -> &Arc<MaterialManager> {
        &self.materials
    }

    /// Number of tracked objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// True if `id` has instances.
    #[must_use]
    pub fn is_tracked(&self, id: T::Id) -> bool {
        self.instances.contains_key(&id)
    }

    /// Starts tracking `object` now. Objects already tracked are left alone.
    ///
    /// Returns true if the object got instances.
    pub fn add(&mut self, object: &T) -> bool {
        if !self.enabled || !object.is_valid() {
            return false;
        }
        let id = object.id();
        if self.instances.contains_key(&id) {
            return true;
        }

        let Some(mut instance) = self.factory.create(&self.materials, object) else {
            return false;
        };
        instance.update(object);
        if instance.is_tickable() {
            self.tickable.insert(id);
        }
        if instance.is_dynamic() {
            self.dynamic.insert(id);
        }
        self.instances.insert(id, instance);
        true
    }

    /// Adds `id` on the next [`InstanceManager::begin_frame`].
    pub fn queue_add(&mut self, id: T::Id) {
        if !self.enabled {
            return;
        }
        self.queued_removals.remove(&id);
        if !self.queued_additions.contains(&id) {
            self.queued_additions.push(id);
        }
    }

    /// Stops tracking `id` now and removes its instance records.
    pub fn remove(&mut self, id: T::Id) -> bool {
        self.queued_updates.remove(&id);
        self.queued_additions.retain(|queued| *queued != id);
        self.detach(id)
    }

    /// Removes `id` on the next [`InstanceManager::begin_frame`].
    pub fn queue_remove(&mut self, id: T::Id) {
        self.queued_additions.retain(|queued| *queued != id);
        self.queued_updates.remove(&id);
        self.queued_removals.insert(id);
    }

    /// Marks a tracked object's instance data stale. Repeated requests
    /// within one frame are applied once.
    pub fn queue_update(&mut self, id: T::Id) {
        if self.instances.contains_key(&id) {
            self.queued_updates.insert(id);
        }
    }

    /// Re-synchronizes `object` now, rebuilding its instances if it asks to.
    pub fn update(&mut self, object: &T) {
        let id = object.id();
        let Some(instance) = self.instances.get_mut(&id) else {
            return;
        };
        if instance.should_reset(object) {
            self.detach(id);
            self.add(object);
        } else {
            instance.update(object);
        }
    }

    /// Fixed-rate update: drops objects that left the world, applies queued
    /// updates, and ticks tickable instances near the camera.
    pub fn tick<S>(&mut self, source: &S, camera: DVec3)
    where
        S: SceneSource<T> + ?Sized,
    {
        self.ticks += 1;

        let gone: Vec<_> = self
            .instances
            .keys()
            .copied()
            .filter(|id| !source.lookup(*id).is_some_and(SceneObject::is_valid))
            .collect();
        for id in gone {
            self.remove(id);
        }

        self.apply_updates(source);

        for id in &self.tickable {
            let Some(instance) = self.instances.get_mut(id) else {
                continue;
            };
            let Some(object) = source.lookup(*id) else {
                continue;
            };
            let divisor = update_divisor(&self.updates, object.world_position(), camera);
            if self.ticks % divisor == 0 {
                instance.tick();
            }
        }
    }

    /// Per-frame hook: applies queued work, then updates dynamic instances in
    /// view. Must run before the frame's draws.
    pub fn begin_frame<S>(&mut self, source: &S, view: &FrameView)
    where
        S: SceneSource<T> + ?Sized,
    {
        self.frames += 1;

        for id in std::mem::take(&mut self.queued_removals) {
            self.detach(id);
        }
        for id in std::mem::take(&mut self.queued_additions) {
            match source.lookup(id) {
                Some(object) => {
                    self.add(object);
                }
                None => tracing::trace!(?id, "queued object vanished before it was added"),
            }
        }
        self.apply_updates(source);

        for id in &self.dynamic {
            let Some(instance) = self.instances.get_mut(id) else {
                continue;
            };
            let Some(object) = source.lookup(*id) else {
                continue;
            };
            if should_frame_update(&self.updates, self.frames, object.world_position(), view) {
                instance.begin_frame(view);
            }
        }
    }

    /// Drops every tracked object and its records. Meshes and GPU buffers
    /// stay cached, ready to be refilled.
    pub fn invalidate(&mut self) {
        for (_, mut instance) in self.instances.drain() {
            instance.remove();
        }
        self.tickable.clear();
        self.dynamic.clear();
        self.queued_additions.clear();
        self.queued_removals.clear();
        self.queued_updates.clear();
    }

    fn apply_updates<S>(&mut self, source: &S)
    where
        S: SceneSource<T> + ?Sized,
    {
        for id in std::mem::take(&mut self.queued_updates) {
            match source.lookup(id) {
                Some(object) if object.is_valid() => self.update(object),
                _ => {
                    self.detach(id);
                }
            }
        }
    }

    fn detach(&mut self, id: T::Id) -> bool {
        self.tickable.remove(&id);
        self.dynamic.remove(&id);
        match self.instances.remove(&id) {
            Some(mut instance) => {
                instance.remove();
                true
            }
            None => false,
        }
    }
}

impl<T: SceneObject> fmt::Debug for InstanceManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceManager")
            .field("tracked", &self.instances.len())
            .field("tickable", &self.tickable.len())
            .field("dynamic", &self.dynamic.len())
            .field("queued_additions", &self.queued_additions.len())
            .finish_non_exhaustive()
    }
}

/// Every how many ticks or frames an object at `position` is updated.
///
/// Grows with squared block distance, so nearby objects update every time.
fn update_divisor(config: &UpdateConfig, position: DVec3, camera: DVec3) -> u64 {
    let dist_sq = (position.floor() - camera.floor()).length_squared();
    // Float to int `as` saturates, so far-off objects clamp instead of overflowing
    let steps = (dist_sq / config.distance_divisor.max(1) as f64) as u64;
    steps.saturating_add(1)
}

fn should_frame_update(config: &UpdateConfig, frame: u64, position: DVec3, view: &FrameView) -> bool {
    let offset = (position - view.camera).as_vec3();
    let look = view.look;
    if (offset + look * config.behind_camera).dot(look) < 0.0 {
        return false;
    }
    frame % update_divisor(config, position, view.camera) == 0
}
