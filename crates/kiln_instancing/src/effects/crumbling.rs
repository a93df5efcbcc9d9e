//! Breaking overlay for instanced objects.
//!
//! Objects being broken are drawn a second time with a crack texture. The
//! overlay only has work while something is being broken, so its materials
//! are built on first use and dropped on world reload.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use kiln_core::RenderOwner;

use crate::config::InstancingConfig;
use crate::gpu::{GpuSink, ReleaseSender, TextureId};
use crate::integration::{InstanceFactory, InstanceManager, SceneObject};
use crate::pipeline::{FrameView, MaterialManager, RenderLayer, RenderStats};

/// Texture unit the crack texture is bound to.
pub const BREAKING_TEXTURE_UNIT: u32 = 4;

/// Texture unit the regular atlas lives on.
pub const BASE_TEXTURE_UNIT: u32 = 0;

/// Highest damage stage.
pub const MAX_STAGE: u8 = 9;

/// The host's crack textures.
pub trait StageTextures {
    /// Crack texture for damage `stage` (0 to [`MAX_STAGE`]).
    fn breaking_texture(&self, stage: u8) -> Option<TextureId>;

    /// Texture to restore on [`BASE_TEXTURE_UNIT`] after the overlay.
    fn base_texture(&self) -> Option<TextureId> {
        None
    }
}

struct State<T: SceneObject> {
    materials: Arc<MaterialManager>,
    instances: InstanceManager<T>,
}

impl<T: SceneObject> State<T> {
    fn kill(mut self) {
        self.instances.invalidate();
        self.materials.delete();
    }
}

/// Renders the breaking overlay.
///
/// Holds at most one material manager and instance manager, built lazily
/// on the first frame with something to draw and released by
/// [`CrumblingRenderer::reset`].
pub struct CrumblingRenderer<T: SceneObject> {
    config: InstancingConfig,
    releases: ReleaseSender,
    owner: RenderOwner,
    factory: Arc<dyn InstanceFactory<T>>,
    state: Option<State<T>>,
}

impl<T: SceneObject> CrumblingRenderer<T> {
    /// Creates an idle overlay renderer.
    pub fn new(
        config: InstancingConfig,
        releases: ReleaseSender,
        owner: RenderOwner,
        factory: Arc<dyn InstanceFactory<T>>,
    ) -> Self {
        Self {
            config,
            releases,
            owner,
            factory,
            state: None,
        }
    }

    /// True while overlay resources are held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// The overlay's material manager, while active.
    #[must_use]
    pub fn materials(&self) -> Option<&Arc<MaterialManager>> {
        self.state.as_ref().map(|state| &state.materials)
    }

    /// Groups `(object, stage)` pairs by damage stage. Stages above
    /// [`MAX_STAGE`] are dropped.
    pub fn group_by_stage<'a, I>(progress: I) -> BTreeMap<u8, Vec<&'a T>>
    where
        I: IntoIterator<Item = (&'a T, u8)>,
    {
        let mut stages: BTreeMap<u8, Vec<&'a T>> = BTreeMap::new();
        for (object, stage) in progress {
            if stage <= MAX_STAGE {
                stages.entry(stage).or_default().push(object);
            }
        }
        stages
    }

    /// Draws the overlay for every stage.
    ///
    /// Per stage: instance the stage's objects, bind the crack texture, draw
    /// the cutout-mipped layer, then drop the instances while keeping the
    /// cached meshes for the next stage and frame.
    ///
    /// # Panics
    ///
    /// Panics if called off the render-owning thread.
    pub fn render_breaking(
        &mut self,
        breaking: &BTreeMap<u8, Vec<&T>>,
        textures: &dyn StageTextures,
        view: &FrameView,
        sink: &mut dyn GpuSink,
    ) -> RenderStats {
        self.owner.assert_owner("CrumblingRenderer::render_breaking");

        let mut stats = RenderStats::default();
        if !self.config.enabled || breaking.values().all(Vec::is_empty) {
            return stats;
        }

        if self.state.is_none() {
            tracing::debug!("breaking overlay state created");
            self.state = Some(self.create_state());
        }
        let Some(state) = self.state.as_mut() else {
            return stats;
        };
        state.materials.check_and_shift_origin(view.camera);

        for (&stage, objects) in breaking {
            if objects.is_empty() {
                continue;
            }
            let Some(texture) = textures.breaking_texture(stage) else {
                tracing::warn!(stage, "no breaking texture for stage");
                continue;
            };

            for object in objects {
                state.instances.add(object);
            }
            state.instances.begin_frame(objects.as_slice(), view);

            sink.bind_texture(BREAKING_TEXTURE_UNIT, texture);
            stats += state.materials.render(RenderLayer::CutoutMipped, view, sink);

            state.instances.invalidate();
        }

        if let Some(base) = textures.base_texture() {
            sink.bind_texture(BASE_TEXTURE_UNIT, base);
        }
        stats
    }

    /// Drops the overlay state and schedules release of its GPU resources.
    /// Call on world reload.
    pub fn reset(&mut self) {
        if let Some(state) = self.state.take() {
            tracing::debug!("breaking overlay state released");
            state.kill();
        }
    }

    fn create_state(&self) -> State<T> {
        let materials = Arc::new(MaterialManager::new(
            &self.config,
            self.releases.clone(),
            self.owner,
        ));
        State {
            instances: InstanceManager::new(
                Arc::clone(&materials),
                Arc::clone(&self.factory),
                &self.config,
            ),
            materials,
        }
    }
}

impl<T: SceneObject> fmt::Debug for CrumblingRenderer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrumblingRenderer")
            .field("active", &self.is_active())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
