//! Object lifecycle through the instance manager and the dispatcher.

#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{Block, BlockFactory};
use glam::DVec3;
use kiln_core::RenderOwner;
use kiln_instancing::{
    BufferKind, FrameView, InstanceManager, InstancedRenderDispatcher, InstancingConfig,
    MaterialManager, ModelData, ModelKey, RecordingSink, ReleaseQueue, RenderLayer,
    SharedInstancer,
};

struct Fixture {
    queue: ReleaseQueue,
    materials: Arc<MaterialManager>,
    factory: Arc<BlockFactory>,
    instances: InstanceManager<Block>,
}

fn fixture_with(config: &InstancingConfig) -> Fixture {
    let queue = ReleaseQueue::new(RenderOwner::current());
    let materials = Arc::new(MaterialManager::new(config, queue.sender(), queue.owner()));
    let factory = Arc::new(BlockFactory::new(RenderLayer::Solid));
    let instances =
        InstanceManager::<Block>::new(Arc::clone(&materials), Arc::clone(&factory) as _, config);
    Fixture {
        queue,
        materials,
        factory,
        instances,
    }
}

fn fixture() -> Fixture {
    fixture_with(&InstancingConfig::default())
}

fn instancer(materials: &MaterialManager, model: u32) -> Option<SharedInstancer<ModelData>> {
    materials
        .find::<ModelKey<u32>, ModelData>(RenderLayer::Solid, "blocks")
        .and_then(|material| material.cached(&ModelKey::new(model)))
}

fn row(count: u32) -> Vec<Block> {
    (0..count)
        .map(|i| Block::new(i, f64::from(i), 64.0, 0.0))
        .collect()
}

#[test]
fn test_add_and_remove() {
    let mut f = fixture();
    let block = Block::new(1, 3.0, 64.0, 5.0);

    assert!(f.instances.add(&block));
    assert!(f.instances.add(&block));
    assert_eq!(f.instances.len(), 1);
    assert_eq!(f.factory.updates(), 1);

    let shared = instancer(&f.materials, 2).unwrap();
    assert_eq!(shared.lock().len(), 1);

    assert!(f.instances.remove(1));
    assert!(!f.instances.remove(1));
    assert!(f.instances.is_empty());
    assert!(shared.lock().is_empty());
}

#[test]
fn test_shared_model_batches_into_one_draw() {
    let mut f = fixture();
    let blocks = row(50);
    for block in &blocks {
        f.instances.add(block);
    }

    let mut sink = RecordingSink::new();
    let stats = f
        .materials
        .render(RenderLayer::Solid, &FrameView::at(DVec3::ZERO), &mut sink);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.instances, 50);
    assert_eq!(f.factory.rasterizer.calls(), 1);
}

#[test]
fn test_queued_updates_coalesce() {
    let mut f = fixture();
    let blocks = row(2);
    f.instances.add(&blocks[0]);
    assert_eq!(f.factory.updates(), 1);

    for _ in 0..3 {
        f.instances.queue_update(0);
    }
    // Not tracked, so ignored
    f.instances.queue_update(1);

    f.instances
        .begin_frame(&blocks, &FrameView::at(DVec3::ZERO));
    assert_eq!(f.factory.updates(), 2);
    assert!(!f.instances.is_tracked(1));

    f.instances
        .begin_frame(&blocks, &FrameView::at(DVec3::ZERO));
    assert_eq!(f.factory.updates(), 2);
}

#[test]
fn test_queued_add_then_remove_cancels() {
    let mut f = fixture();
    let blocks = row(3);

    f.instances.queue_add(0);
    f.instances.queue_add(1);
    f.instances.queue_add(1);
    f.instances.queue_remove(1);
    // Not in the source by the time the frame starts
    f.instances.queue_add(99);

    f.instances
        .begin_frame(&blocks, &FrameView::at(DVec3::ZERO));
    assert!(f.instances.is_tracked(0));
    assert!(!f.instances.is_tracked(1));
    assert_eq!(f.instances.len(), 1);
}

#[test]
fn test_tick_drops_invalid_objects() {
    let mut f = fixture();
    let mut blocks = row(3);
    for block in &blocks {
        f.instances.add(block);
    }

    blocks[1].valid = false;
    blocks.remove(2);
    f.instances.tick(&blocks, DVec3::ZERO);

    assert!(f.instances.is_tracked(0));
    assert!(!f.instances.is_tracked(1));
    assert!(!f.instances.is_tracked(2));
    assert_eq!(instancer(&f.materials, 2).unwrap().lock().len(), 1);
}

#[test]
fn test_near_tickables_tick_every_time() {
    let mut f = fixture();
    let blocks = row(2);
    for block in &blocks {
        f.instances.add(block);
    }

    for _ in 0..3 {
        f.instances.tick(&blocks, DVec3::new(0.0, 64.0, 0.0));
    }
    assert_eq!(f.factory.ticks(), 6);
}

#[test]
fn test_should_reset_moves_to_new_model() {
    let mut f = fixture();
    let block = Block::new(4, 0.0, 64.0, 0.0);
    f.instances.add(&block);

    let rebuilt = block.with_model(3);
    f.instances.update(&rebuilt);

    assert!(f.instances.is_tracked(4));
    assert!(instancer(&f.materials, 2).unwrap().lock().is_empty());
    assert_eq!(instancer(&f.materials, 3).unwrap().lock().len(), 1);
}

#[test]
fn test_invalidate_keeps_meshes_and_buffers() {
    let mut f = fixture();
    let blocks = row(4);
    for block in &blocks {
        f.instances.add(block);
    }

    let mut sink = RecordingSink::new();
    let view = FrameView::at(DVec3::ZERO);
    f.materials.render(RenderLayer::Solid, &view, &mut sink);
    assert_eq!(sink.live_buffers(), 3);

    f.instances.invalidate();
    assert!(f.instances.is_empty());
    assert!(instancer(&f.materials, 2).unwrap().lock().is_empty());
    assert_eq!(sink.live_buffers(), 3);
    assert_eq!(f.queue.pending(), 0);

    // Empty instancers are skipped
    let stats = f.materials.render(RenderLayer::Solid, &view, &mut sink);
    assert_eq!(stats.draw_calls, 0);
    assert_eq!(stats.materials_skipped, 1);

    for block in &blocks {
        f.instances.add(block);
    }
    assert_eq!(f.factory.rasterizer.calls(), 1);
    let stats = f.materials.render(RenderLayer::Solid, &view, &mut sink);
    assert_eq!(stats.instances, 4);
    assert_eq!(sink.live_buffers_of(BufferKind::Vertex), 1);
}

#[test]
fn test_invalidated_object_is_rebuilt_on_add() {
    let mut f = fixture();
    let block = Block::new(1, 3.0, 64.0, 0.0);
    let view = FrameView::at(DVec3::ZERO);
    let mut sink = RecordingSink::new();
    f.instances.add(&block);

    f.instances.invalidate();
    assert!(!f.instances.is_tracked(1));
    assert!(f.instances.add(&block));
    assert!(f.instances.is_tracked(1));

    // The fresh record accepts updates
    let mut moved = block.clone();
    moved.position = DVec3::new(7.0, 64.0, 0.0);
    f.instances.update(&moved);

    let stats = f.materials.render(RenderLayer::Solid, &view, &mut sink);
    assert_eq!((stats.draw_calls, stats.instances), (1, 1));
    let shared = instancer(&f.materials, 2).unwrap();
    assert_eq!(shared.lock().records()[0].translation().x, 7.0);
}

#[test]
fn test_disabled_config_tracks_nothing() {
    let config = InstancingConfig {
        enabled: false,
        ..InstancingConfig::default()
    };
    let mut f = fixture_with(&config);
    let blocks = row(2);

    assert!(!f.instances.add(&blocks[0]));
    f.instances.queue_add(1);
    f.instances
        .begin_frame(&blocks, &FrameView::at(DVec3::ZERO));

    assert!(f.instances.is_empty());
    assert_eq!(f.materials.material_count(), 0);
}

type Dispatcher = InstancedRenderDispatcher<&'static str, Block, Block>;

fn dispatcher() -> Dispatcher {
    Dispatcher::new(
        InstancingConfig::default(),
        Arc::new(BlockFactory::new(RenderLayer::Solid)),
        Arc::new(BlockFactory::new(RenderLayer::Cutout)),
    )
}

#[test]
fn test_dispatcher_draws_a_loaded_world() {
    let mut dispatcher = dispatcher();
    let tiles = row(10);
    let entities = vec![Block::new(500, 2.0, 65.0, 2.0)];
    dispatcher.load_world("overworld", &tiles, &entities);

    let world = dispatcher.world(&"overworld").unwrap();
    assert_eq!(world.tiles().len(), 10);
    assert_eq!(world.entities().len(), 1);

    let mut sink = RecordingSink::new();
    let view = FrameView::at(DVec3::new(0.0, 64.0, 0.0));
    dispatcher.begin_frame(&"overworld", &tiles, &entities, &view, &mut sink);

    let solid = dispatcher.render_layer(&"overworld", RenderLayer::Solid, &view, &mut sink);
    let cutout = dispatcher.render_layer(&"overworld", RenderLayer::Cutout, &view, &mut sink);
    assert_eq!((solid.draw_calls, solid.instances), (1, 10));
    assert_eq!((cutout.draw_calls, cutout.instances), (1, 1));

    let missing = dispatcher.render_layer(&"nether", RenderLayer::Solid, &view, &mut sink);
    assert!(missing.is_idle());
}

#[test]
fn test_dispatcher_reload_releases_previous_world() {
    let mut dispatcher = dispatcher();
    let tiles = row(3);
    let no_entities: Vec<Block> = Vec::new();
    let mut sink = RecordingSink::new();
    let view = FrameView::at(DVec3::ZERO);

    dispatcher.load_world("overworld", &tiles, &no_entities);
    dispatcher.begin_frame(&"overworld", &tiles, &no_entities, &view, &mut sink);
    dispatcher.render_layer(&"overworld", RenderLayer::Solid, &view, &mut sink);
    assert_eq!(sink.live_buffers(), 3);

    dispatcher.load_world("overworld", &tiles, &no_entities);
    assert_eq!(dispatcher.world_count(), 1);
    assert_eq!(dispatcher.pending_releases(), 1);

    dispatcher.begin_frame(&"overworld", &tiles, &no_entities, &view, &mut sink);
    assert_eq!(dispatcher.pending_releases(), 0);
    dispatcher.render_layer(&"overworld", RenderLayer::Solid, &view, &mut sink);
    assert_eq!(sink.live_buffers(), 3);

    assert!(dispatcher.unload_world(&"overworld"));
    assert!(!dispatcher.unload_world(&"overworld"));
    assert_eq!(dispatcher.run_releases(&mut sink), 1);
    assert_eq!(sink.live_buffers(), 0);
}

#[test]
fn test_dispatcher_queued_updates_apply_next_frame() {
    let mut dispatcher = dispatcher();
    let mut tiles = row(1);
    let no_entities: Vec<Block> = Vec::new();
    let mut sink = RecordingSink::new();
    let view = FrameView::at(DVec3::ZERO);
    dispatcher.load_world("overworld", &tiles, &no_entities);

    tiles[0].position = DVec3::new(9.0, 64.0, 0.0);
    dispatcher.queue_tile_update(&"overworld", 0);
    dispatcher.begin_frame(&"overworld", &tiles, &no_entities, &view, &mut sink);

    let materials = dispatcher.world(&"overworld").unwrap().materials();
    let shared = instancer(materials, 2).unwrap();
    assert_eq!(shared.lock().records()[0].translation().x, 9.0);
}

#[test]
fn test_dispatcher_world_mut_creates_empty_world() {
    let mut dispatcher = dispatcher();
    let tile = Block::new(1, 0.0, 64.0, 0.0);
    let entity = Block::new(2, 1.0, 64.0, 0.0);

    let world = dispatcher.world_mut(&"end");
    assert!(world.tiles().is_empty());
    assert!(world.entities().is_empty());
    assert!(world.tiles_mut().add(&tile));
    assert!(world.entities_mut().add(&entity));

    // A second lookup returns the same world
    assert_eq!(dispatcher.world_mut(&"end").tiles().len(), 1);
    assert_eq!(dispatcher.world_count(), 1);

    let mut sink = RecordingSink::new();
    let view = FrameView::at(DVec3::ZERO);
    let solid = dispatcher.render_layer(&"end", RenderLayer::Solid, &view, &mut sink);
    let cutout = dispatcher.render_layer(&"end", RenderLayer::Cutout, &view, &mut sink);
    assert_eq!((solid.draw_calls, solid.instances), (1, 1));
    assert_eq!((cutout.draw_calls, cutout.instances), (1, 1));
}
