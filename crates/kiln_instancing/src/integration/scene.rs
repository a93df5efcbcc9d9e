//! Host-facing contracts for scene objects and their instances.

use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use glam::{DVec3, Vec3};

use crate::error::InstanceResult;
use crate::instancing::{InstanceData, InstanceHandle, SharedInstancer};
use crate::pipeline::{FrameView, MaterialManager};

/// A live object in the host's world (a tile, an entity).
pub trait SceneObject {
    /// Stable identity.
    type Id: Copy + Eq + Hash + fmt::Debug;

    /// The object's identity.
    fn id(&self) -> Self::Id;

    /// World position, full precision.
    fn world_position(&self) -> DVec3;

    /// False once the object has left the world.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Where queued work looks objects up by id.
pub trait SceneSource<T: SceneObject> {
    /// Returns the object with `id`, if it is still around.
    fn lookup(&self, id: T::Id) -> Option<&T>;
}

impl<T: SceneObject> SceneSource<T> for [T] {
    fn lookup(&self, id: T::Id) -> Option<&T> {
        self.iter().find(|object| object.id() == id)
    }
}

impl<T: SceneObject> SceneSource<T> for [&T] {
    fn lookup(&self, id: T::Id) -> Option<&T> {
        self.iter().copied().find(|object| object.id() == id)
    }
}

impl<T: SceneObject> SceneSource<T> for Vec<T> {
    fn lookup(&self, id: T::Id) -> Option<&T> {
        self.as_slice().lookup(id)
    }
}

impl<T: SceneObject, S: BuildHasher> SceneSource<T> for HashMap<T::Id, T, S> {
    fn lookup(&self, id: T::Id) -> Option<&T> {
        self.get(&id)
    }
}

/// The instance records one scene object owns.
pub trait ObjectInstance<T: SceneObject>: Send {
    /// Re-writes instance data from the object's current state.
    fn update(&mut self, object: &T);

    /// Removes every owned record from its instancer.
    fn remove(&mut self);

    /// True if the object changed so much that its instances must be rebuilt.
    fn should_reset(&self, _object: &T) -> bool {
        false
    }

    /// Receives [`ObjectInstance::tick`] calls.
    fn is_tickable(&self) -> bool {
        false
    }

    /// Receives [`ObjectInstance::begin_frame`] calls.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Fixed-rate update, throttled by distance.
    fn tick(&mut self) {}

    /// Per-frame update, throttled by distance and skipped behind the camera.
    fn begin_frame(&mut self, _view: &FrameView) {}
}

/// Maps scene objects to instances in a material manager.
pub trait InstanceFactory<T: SceneObject>: Send + Sync {
    /// Creates the instances for `object`, or `None` if it is not drawn
    /// with instancing.
    fn create(&self, materials: &MaterialManager, object: &T) -> Option<Box<dyn ObjectInstance<T>>>;
}

/// One record in one instancer: the building block of most object instances.
#[derive(Debug)]
pub struct ModelInstance<D: InstanceData> {
    instancer: SharedInstancer<D>,
    handle: Option<InstanceHandle>,
}

impl<D: InstanceData> ModelInstance<D> {
    /// Adds a record to `instancer`.
    ///
    /// # Errors
    ///
    /// Fails if the instancer has been deleted.
    pub fn new(instancer: SharedInstancer<D>) -> InstanceResult<Self> {
        let handle = instancer.lock().add()?;
        Ok(Self {
            instancer,
            handle: Some(handle),
        })
    }

    /// The record's handle, until removed.
    #[must_use]
    pub fn handle(&self) -> Option<InstanceHandle> {
        self.handle
    }

    /// The instancer holding the record.
    #[must_use]
    pub fn instancer(&self) -> &SharedInstancer<D> {
        &self.instancer
    }

    /// Edits the record. `write` receives `world` converted to the
    /// origin-relative coordinates records are stored in.
    ///
    /// Does nothing once removed.
    ///
    /// # Errors
    ///
    /// Fails if the handle went stale or the instancer was deleted.
    pub fn write(&mut self, world: DVec3, write: impl FnOnce(&mut D, Vec3)) -> InstanceResult<()> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        let mut instancer = self.instancer.lock();
        let relative = instancer.relative(world);
        write(instancer.get_mut(handle)?, relative);
        Ok(())
    }

    /// Removes the record. Safe to call more than once.
    pub fn remove(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(error) = self.instancer.lock().remove(handle) {
            tracing::debug!(%error, "instance already gone");
        }
    }
}
