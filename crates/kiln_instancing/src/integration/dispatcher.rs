//! Per-world dispatch of instanced rendering.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use glam::DVec3;
use kiln_core::RenderOwner;

use super::instance_manager::InstanceManager;
use super::scene::{InstanceFactory, SceneObject, SceneSource};
use crate::config::InstancingConfig;
use crate::gpu::{GpuSink, ReleaseQueue, ReleaseSender};
use crate::pipeline::{FrameView, MaterialManager, RenderLayer, RenderStats};

/// The instancing state of one loaded world.
pub struct WorldRenderers<Tile: SceneObject, Entity: SceneObject> {
    materials: Arc<MaterialManager>,
    tiles: InstanceManager<Tile>,
    entities: InstanceManager<Entity>,
}

impl<Tile: SceneObject, Entity: SceneObject> WorldRenderers<Tile, Entity> {
    /// The world's materials.
    #[must_use]
    pub fn materials(&self) -> &Arc<MaterialManager> {
        &self.materials
    }

    /// Tile instances.
    #[must_use]
    pub fn tiles(&self) -> &InstanceManager<Tile> {
        &self.tiles
    }

    /// Tile instances, mutably.
    pub fn tiles_mut(&mut self) -> &mut InstanceManager<Tile> {
        &mut self.tiles
    }

    /// Entity instances.
    #[must_use]
    pub fn entities(&self) -> &InstanceManager<Entity> {
        &self.entities
    }

    /// Entity instances, mutably.
    pub fn entities_mut(&mut self) -> &mut InstanceManager<Entity> {
        &mut self.entities
    }

    fn delete(mut self) {
        self.tiles.invalidate();
        self.entities.invalidate();
        self.materials.delete();
    }
}

/// Owns the instancing state of every loaded world, plus the deferred GPU
/// release queue all of them feed.
///
/// Created on, and bound to, the render-owning thread.
pub struct InstancedRenderDispatcher<W, Tile: SceneObject, Entity: SceneObject> {
    config: InstancingConfig,
    owner: RenderOwner,
    releases: ReleaseQueue,
    tile_factory: Arc<dyn InstanceFactory<Tile>>,
    entity_factory: Arc<dyn InstanceFactory<Entity>>,
    worlds: HashMap<W, WorldRenderers<Tile, Entity>>,
}

impl<W, Tile, Entity> InstancedRenderDispatcher<W, Tile, Entity>
where
    W: Eq + Hash + Clone + fmt::Debug,
    Tile: SceneObject,
    Entity: SceneObject,
{
    /// Creates a dispatcher owned by the calling thread.
    pub fn new(
        config: InstancingConfig,
        tile_factory: Arc<dyn InstanceFactory<Tile>>,
        entity_factory: Arc<dyn InstanceFactory<Entity>>,
    ) -> Self {
        let owner = RenderOwner::current();
        Self {
            config,
            owner,
            releases: ReleaseQueue::new(owner),
            tile_factory,
            entity_factory,
            worlds: HashMap::new(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &InstancingConfig {
        &self.config
    }

    /// The render-owning thread.
    #[must_use]
    pub const fn owner(&self) -> RenderOwner {
        self.owner
    }

    /// A sender other components use to schedule GPU releases.
    #[must_use]
    pub fn release_sender(&self) -> ReleaseSender {
        self.releases.sender()
    }

    /// Releases waiting for the next frame.
    #[must_use]
    pub fn pending_releases(&self) -> usize {
        self.releases.pending()
    }

    /// Number of loaded worlds.
    #[must_use]
    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    /// The state of a loaded world.
    #[must_use]
    pub fn world(&self, world: &W) -> Option<&WorldRenderers<Tile, Entity>> {
        self.worlds.get(world)
    }

    /// The state of a world, created empty on first use.
    pub fn world_mut(&mut self, world: &W) -> &mut WorldRenderers<Tile, Entity> {
        let Self {
            config,
            owner,
            releases,
            tile_factory,
            entity_factory,
            worlds,
        } = self;
        worlds.entry(world.clone()).or_insert_with(|| {
            build_world(config, releases.sender(), *owner, tile_factory, entity_factory)
        })
    }

    /// (Re)loads a world: any previous state is deleted, and every given
    /// tile and entity is added.
    pub fn load_world<'a, TI, EI>(&mut self, world: W, tiles: TI, entities: EI)
    where
        TI: IntoIterator<Item = &'a Tile>,
        EI: IntoIterator<Item = &'a Entity>,
        Tile: 'a,
        Entity: 'a,
    {
        let mut renderers = self.create_world();
        if self.config.enabled {
            for tile in tiles {
                renderers.tiles.add(tile);
            }
            for entity in entities {
                renderers.entities.add(entity);
            }
        }
        tracing::info!(
            ?world,
            tiles = renderers.tiles.len(),
            entities = renderers.entities.len(),
            "world loaded",
        );

        if let Some(previous) = self.worlds.insert(world, renderers) {
            previous.delete();
        }
    }

    /// Forgets a world and schedules release of all its GPU resources.
    pub fn unload_world(&mut self, world: &W) -> bool {
        match self.worlds.remove(world) {
            Some(renderers) => {
                tracing::info!(?world, "world unloaded");
                renderers.delete();
                true
            }
            None => false,
        }
    }

    /// Fixed-rate update for one world.
    pub fn tick<TS, ES>(&mut self, world: &W, tiles: &TS, entities: &ES, camera: DVec3)
    where
        TS: SceneSource<Tile> + ?Sized,
        ES: SceneSource<Entity> + ?Sized,
    {
        if let Some(renderers) = self.worlds.get_mut(world) {
            renderers.tiles.tick(tiles, camera);
            renderers.entities.tick(entities, camera);
        }
    }

    /// Per-frame setup for one world: runs pending GPU releases, recenters
    /// the floating origin, and applies queued object work.
    ///
    /// # Panics
    ///
    /// Panics if called off the render-owning thread.
    pub fn begin_frame<TS, ES>(
        &mut self,
        world: &W,
        tiles: &TS,
        entities: &ES,
        view: &FrameView,
        sink: &mut dyn GpuSink,
    ) where
        TS: SceneSource<Tile> + ?Sized,
        ES: SceneSource<Entity> + ?Sized,
    {
        self.run_releases(sink);
        if !self.config.enabled {
            return;
        }
        if let Some(renderers) = self.worlds.get_mut(world) {
            renderers.materials.check_and_shift_origin(view.camera);
            renderers.tiles.begin_frame(tiles, view);
            renderers.entities.begin_frame(entities, view);
        }
    }

    /// Runs every pending GPU release.
    ///
    /// # Panics
    ///
    /// Panics if called off the render-owning thread.
    pub fn run_releases(&self, sink: &mut dyn GpuSink) -> usize {
        self.releases.run_all(|release| release.run(sink))
    }

    /// Draws one render layer of one world.
    pub fn render_layer(
        &self,
        world: &W,
        layer: RenderLayer,
        view: &FrameView,
        sink: &mut dyn GpuSink,
    ) -> RenderStats {
        if !self.config.enabled {
            return RenderStats::default();
        }
        self.worlds
            .get(world)
            .map(|renderers| renderers.materials.render(layer, view, sink))
            .unwrap_or_default()
    }

    /// Queues a tile's instance data for re-synchronization.
    pub fn queue_tile_update(&mut self, world: &W, tile: Tile::Id) {
        if let Some(renderers) = self.worlds.get_mut(world) {
            renderers.tiles.queue_update(tile);
        }
    }

    /// Queues an entity's instance data for re-synchronization.
    pub fn queue_entity_update(&mut self, world: &W, entity: Entity::Id) {
        if let Some(renderers) = self.worlds.get_mut(world) {
            renderers.entities.queue_update(entity);
        }
    }

    fn create_world(&self) -> WorldRenderers<Tile, Entity> {
        build_world(
            &self.config,
            self.releases.sender(),
            self.owner,
            &self.tile_factory,
            &self.entity_factory,
        )
    }
}

fn build_world<Tile: SceneObject, Entity: SceneObject>(
    config: &InstancingConfig,
    releases: ReleaseSender,
    owner: RenderOwner,
    tile_factory: &Arc<dyn InstanceFactory<Tile>>,
    entity_factory: &Arc<dyn InstanceFactory<Entity>>,
) -> WorldRenderers<Tile, Entity> {
    let materials = Arc::new(MaterialManager::new(config, releases, owner));
    WorldRenderers {
        tiles: InstanceManager::new(Arc::clone(&materials), Arc::clone(tile_factory), config),
        entities: InstanceManager::new(Arc::clone(&materials), Arc::clone(entity_factory), config),
        materials,
    }
}

impl<W, Tile: SceneObject, Entity: SceneObject> fmt::Debug for InstancedRenderDispatcher<W, Tile, Entity> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstancedRenderDispatcher")
            .field("worlds", &self.worlds.len())
            .field("pending_releases", &self.releases.pending())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
