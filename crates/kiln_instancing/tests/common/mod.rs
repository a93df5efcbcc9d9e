//! Shared scene fixtures.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::{DVec3, Mat3, Mat4, Vec3};
use kiln_instancing::{
    InstanceFactory, MaterialManager, MaterialSpec, MeshRasterizer, ModelData, ModelInstance,
    ModelKey, ObjectInstance, ProgramId, RasterVertex, RasterizeError, RasterizedMesh,
    RenderLayer, SceneObject, StageTextures, TextureId, VertexFormat,
};

pub const BLOCK_PROGRAM: ProgramId = ProgramId(10);

/// One upward-facing quad at height `y`.
pub fn quad(y: f32) -> [RasterVertex; 4] {
    [
        RasterVertex::new([0.0, y, 0.0], [0, 127, 0], [0.0, 0.0]),
        RasterVertex::new([1.0, y, 0.0], [0, 127, 0], [1.0, 0.0]),
        RasterVertex::new([1.0, y, 1.0], [0, 127, 0], [1.0, 1.0]),
        RasterVertex::new([0.0, y, 1.0], [0, 127, 0], [0.0, 1.0]),
    ]
}

/// A mesh of `count` stacked quads.
pub fn mesh(count: usize) -> RasterizedMesh {
    RasterizedMesh::from_quads((0..count).map(|i| quad(i as f32)))
}

/// Rasterizes model `n` into `n` quads and counts calls.
#[derive(Default)]
pub struct QuadRasterizer {
    pub calls: AtomicUsize,
}

impl QuadRasterizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MeshRasterizer<u32> for QuadRasterizer {
    fn rasterize(&self, model: &u32, transform: &Mat4) -> Result<RasterizedMesh, RasterizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *model == u32::MAX {
            return Err("unknown model".into());
        }
        let vertices = mesh(*model as usize)
            .vertices()
            .iter()
            .map(|v| {
                let p = transform.transform_point3(Vec3::from(v.position));
                RasterVertex::new(p.to_array(), v.normal, v.uv)
            })
            .collect();
        Ok(RasterizedMesh::new(vertices))
    }
}

/// A placed block.
#[derive(Clone, Debug)]
pub struct Block {
    pub id: u32,
    pub position: DVec3,
    pub model: u32,
    pub valid: bool,
}

impl Block {
    pub fn new(id: u32, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            position: DVec3::new(x, y, z),
            model: 2,
            valid: true,
        }
    }

    pub fn with_model(mut self, model: u32) -> Self {
        self.model = model;
        self
    }
}

impl SceneObject for Block {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }

    fn world_position(&self) -> DVec3 {
        self.position
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

pub fn block_spec() -> MaterialSpec {
    MaterialSpec::new("blocks", BLOCK_PROGRAM, VertexFormat::block())
}

/// Places one `ModelData` record per block in the "blocks" material.
pub struct BlockFactory {
    pub rasterizer: QuadRasterizer,
    pub layer: RenderLayer,
    pub updates: Arc<AtomicUsize>,
    pub ticks: Arc<AtomicUsize>,
}

impl BlockFactory {
    pub fn new(layer: RenderLayer) -> Self {
        Self {
            rasterizer: QuadRasterizer::default(),
            layer,
            updates: Arc::new(AtomicUsize::new(0)),
            ticks: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl InstanceFactory<Block> for BlockFactory {
    fn create(
        &self,
        materials: &MaterialManager,
        object: &Block,
    ) -> Option<Box<dyn ObjectInstance<Block>>> {
        let material = materials.material::<ModelKey<u32>, ModelData>(self.layer, block_spec());
        let instancer = material.get_model(&self.rasterizer, object.model, None).ok()?;
        let model = ModelInstance::new(instancer).ok()?;
        Some(Box::new(BlockInstance {
            model,
            built_for: object.model,
            updates: Arc::clone(&self.updates),
            ticks: Arc::clone(&self.ticks),
        }))
    }
}

pub struct BlockInstance {
    model: ModelInstance<ModelData>,
    built_for: u32,
    updates: Arc<AtomicUsize>,
    ticks: Arc<AtomicUsize>,
}

impl ObjectInstance<Block> for BlockInstance {
    fn update(&mut self, object: &Block) {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let written = self.model.write(object.position, |data, relative| {
            data.set_matrices(Mat4::from_translation(relative), Mat3::IDENTITY);
        });
        assert!(written.is_ok(), "{written:?}");
    }

    fn remove(&mut self) {
        self.model.remove();
    }

    fn should_reset(&self, object: &Block) -> bool {
        object.model != self.built_for
    }

    fn is_tickable(&self) -> bool {
        true
    }

    fn tick(&mut self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }
}

/// Stage `n` maps to texture `100 + n`; the atlas is texture 1.
pub struct CrackTextures;

impl StageTextures for CrackTextures {
    fn breaking_texture(&self, stage: u8) -> Option<TextureId> {
        Some(TextureId(100 + u32::from(stage)))
    }

    fn base_texture(&self) -> Option<TextureId> {
        Some(TextureId(1))
    }
}
