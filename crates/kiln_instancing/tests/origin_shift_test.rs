//! Floating-origin behaviour seen through the material manager.

#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{Block, BlockFactory};
use glam::{DVec3, IVec3, Vec3};
use kiln_core::RenderOwner;
use kiln_instancing::gpu::GpuCommand;
use kiln_instancing::{
    FrameView, InstanceManager, InstancingConfig, MaterialManager, ModelData, ModelKey,
    RecordingSink, ReleaseQueue, RenderLayer, SharedInstancer, Uniform,
};

struct Scene {
    queue: ReleaseQueue,
    materials: Arc<MaterialManager>,
    instances: InstanceManager<Block>,
}

fn scene() -> Scene {
    let config = InstancingConfig::default();
    let queue = ReleaseQueue::new(RenderOwner::current());
    let materials = Arc::new(MaterialManager::new(&config, queue.sender(), queue.owner()));
    let instances = InstanceManager::<Block>::new(
        Arc::clone(&materials),
        Arc::new(BlockFactory::new(RenderLayer::Solid)),
        &config,
    );
    Scene {
        queue,
        materials,
        instances,
    }
}

fn block_instancer(materials: &MaterialManager) -> SharedInstancer<ModelData> {
    materials
        .find::<ModelKey<u32>, ModelData>(RenderLayer::Solid, "blocks")
        .and_then(|material| material.cached(&ModelKey::new(2)))
        .unwrap()
}

fn camera_uniform(sink: &RecordingSink) -> Option<[f32; 3]> {
    sink.commands().iter().rev().find_map(|command| match command {
        GpuCommand::UniformVec3(Uniform::CameraPosition, value) => Some(*value),
        _ => None,
    })
}

#[test]
fn test_far_camera_recenters_origin() {
    let mut scene = scene();
    let block = Block::new(1, 600.0, 70.0, 0.0);
    assert!(scene.instances.add(&block));

    let instancer = block_instancer(&scene.materials);
    assert_eq!(
        instancer.lock().records()[0].translation(),
        Vec3::new(600.0, 70.0, 0.0)
    );

    let camera = DVec3::new(600.0, 70.0, 0.0);
    let shift = scene.materials.check_and_shift_origin(camera).unwrap();
    assert_eq!(shift.from, IVec3::ZERO);
    assert_eq!(shift.to, IVec3::new(592, 64, 0));
    assert!(instancer.lock().needs_origin_refresh());

    let mut sink = RecordingSink::new();
    let stats = scene
        .materials
        .render(RenderLayer::Solid, &FrameView::at(camera), &mut sink);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(camera_uniform(&sink), Some([8.0, 6.0, 0.0]));

    let guard = instancer.lock();
    assert!(!guard.needs_origin_refresh());
    assert_eq!(guard.records()[0].translation(), Vec3::new(8.0, 6.0, 0.0));
}

#[test]
fn test_uploaded_records_follow_the_shift() {
    let mut scene = scene();
    scene.instances.add(&Block::new(1, 600.0, 70.0, 0.0));
    let camera = DVec3::new(600.0, 70.0, 0.0);
    let mut sink = RecordingSink::new();

    // First frame uploads against the old origin
    scene
        .materials
        .render(RenderLayer::Solid, &FrameView::at(DVec3::ZERO), &mut sink);
    scene.materials.check_and_shift_origin(camera);
    scene
        .materials
        .render(RenderLayer::Solid, &FrameView::at(camera), &mut sink);

    let draw = *sink.draws().last().unwrap();
    let bytes = sink.buffer_contents(draw.instance_buffer).unwrap();
    let record: ModelData = bytemuck::pod_read_unaligned(&bytes[..ModelData::SIZE]);
    assert_eq!(record.translation(), Vec3::new(8.0, 6.0, 0.0));
}

#[test]
fn test_shift_is_idempotent_for_a_still_camera() {
    let scene = scene();
    let camera = DVec3::new(600.0, 70.0, 0.0);

    assert!(scene.materials.check_and_shift_origin(camera).is_some());
    let generation = scene.materials.origin().generation();

    for _ in 0..3 {
        assert!(scene.materials.check_and_shift_origin(camera).is_none());
    }
    assert_eq!(scene.materials.origin().generation(), generation);
    assert_eq!(scene.materials.origin().position(), IVec3::new(592, 64, 0));
}

#[test]
fn test_additions_after_shift_use_new_origin() {
    let mut scene = scene();
    scene
        .materials
        .check_and_shift_origin(DVec3::new(1_000_000.0, 0.0, 0.0));
    assert_eq!(
        scene.materials.origin().position(),
        IVec3::new(1_000_000, 0, 0)
    );

    scene
        .instances
        .add(&Block::new(7, 1_000_000.25, 3.5, -2.0));

    let instancer = block_instancer(&scene.materials);
    let translation = instancer.lock().records()[0].translation();
    assert_eq!(translation, Vec3::new(0.25, 3.5, -2.0));
}

#[test]
fn test_negative_camera_floors_to_grid() {
    let scene = scene();
    let shift = scene
        .materials
        .check_and_shift_origin(DVec3::new(-600.5, 0.0, 0.0))
        .unwrap();
    assert_eq!(shift.to, IVec3::new(-608, 0, 0));
    assert_eq!(shift.delta(), IVec3::new(-608, 0, 0));
}

#[test]
fn test_shift_off_owner_thread_panics() {
    let scene = scene();
    let materials = Arc::clone(&scene.materials);
    let result = std::thread::spawn(move || {
        materials.check_and_shift_origin(DVec3::new(5_000.0, 0.0, 0.0))
    })
    .join();
    assert!(result.is_err());
    assert_eq!(scene.queue.pending(), 0);
}
