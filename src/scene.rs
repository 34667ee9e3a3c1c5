use crate::cell::{GridIndex, TerrainMesh};
use crate::particles::Particle;
use crate::scatter::ScatterInstance;
use std::collections::HashMap;
use std::sync::Arc;

/// Identifies one renderable pushed by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderKey {
    Terrain(GridIndex),
    Vegetation(GridIndex),
    Structures(GridIndex),
    ContactParticles,
}

/// Shared, immutable payloads; a sink may keep them as long as it likes.
#[derive(Clone, Debug)]
pub enum Renderable {
    Terrain(Arc<TerrainMesh>),
    Instances(Arc<[ScatterInstance]>),
    Particles(Arc<[Particle]>),
}

/// The scene graph the core publishes into. The core never reads back what
/// it added. Adding an existing key replaces it.
pub trait SceneSink {
    fn add(&mut self, key: RenderKey, renderable: Renderable);
    fn remove(&mut self, key: RenderKey);
}

/// Drops everything; for headless runs.
#[derive(Default)]
pub struct NullSink;

impl SceneSink for NullSink {
    fn add(&mut self, _key: RenderKey, _renderable: Renderable) {}
    fn remove(&mut self, _key: RenderKey) {}
}

/// Keeps the latest renderable per key. Used by the headless driver and the
/// web binding to expose what is currently in the scene.
#[derive(Default)]
pub struct SceneRegistry {
    entries: HashMap<RenderKey, Renderable>,
    added: u64,
    removed: u64,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &RenderKey) -> Option<&Renderable> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &RenderKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &RenderKey> {
        self.entries.keys()
    }

    /// Lifetime totals of add and remove calls.
    pub fn churn(&self) -> (u64, u64) {
        (self.added, self.removed)
    }
}

impl SceneSink for SceneRegistry {
    fn add(&mut self, key: RenderKey, renderable: Renderable) {
        self.added += 1;
        self.entries.insert(key, renderable);
    }

    fn remove(&mut self, key: RenderKey) {
        if self.entries.remove(&key).is_some() {
            self.removed += 1;
        }
    }
}
