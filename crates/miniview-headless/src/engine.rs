//! Scene engine without a GPU
//!
//! Models are fetched and parsed for their bounds. Environment textures are
//! fetched so a missing file fails the same way it would on a renderer.
//! The resulting scene is plain data that can be serialized for inspection.

use anyhow::{bail, Context, Result};
use miniview_core::{
    Bounds, CameraFraming, Color4, Disposable, EngineOptions, EngineProvider, EnvironmentRequest,
    SceneEngine,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::fetch::AssetFetcher;
use crate::gltf;

/// Size of the virtual drawing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadlessSurface {
    pub width: u32,
    pub height: u32,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEntry {
    pub id: u64,
    pub url: String,
    pub bytes: usize,
    pub meshes: usize,
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentEntry {
    pub id: u64,
    pub request: EnvironmentRequest,
    pub bytes: usize,
}

/// Everything currently in the scene
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneSnapshot {
    pub surface: HeadlessSurface,
    pub antialias: bool,
    pub preserve_drawing_buffer: bool,
    pub models: Vec<ModelEntry>,
    pub environment: Option<EnvironmentEntry>,
    pub camera: Option<CameraFraming>,
    pub auto_clear: bool,
    pub clear_color: Option<Color4>,
    pub rendering: bool,
    pub disposed: bool,
}

pub struct HeadlessEngine {
    fetcher: AssetFetcher,
    scene: Arc<Mutex<SceneSnapshot>>,
    next_id: AtomicU64,
}

impl HeadlessEngine {
    pub fn new(surface: HeadlessSurface, options: &EngineOptions, fetcher: AssetFetcher) -> Self {
        let scene = SceneSnapshot {
            surface,
            antialias: options.antialias,
            preserve_drawing_buffer: options.preserve_drawing_buffer,
            ..Default::default()
        };

        Self {
            fetcher,
            scene: Arc::new(Mutex::new(scene)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        lock(&self.scene).clone()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Parsed model waiting to be added to the scene
pub struct HeadlessModel {
    entry: ModelEntry,
    scene: Arc<Mutex<SceneSnapshot>>,
}

impl HeadlessModel {
    pub fn entry(&self) -> &ModelEntry {
        &self.entry
    }
}

impl Disposable for HeadlessModel {
    async fn dispose(self) {
        lock(&self.scene).models.retain(|m| m.id != self.entry.id);
        debug!(id = self.entry.id, url = %self.entry.url, "Disposed model");
    }
}

pub struct HeadlessEnvironment {
    entry: EnvironmentEntry,
    scene: Arc<Mutex<SceneSnapshot>>,
}

impl HeadlessEnvironment {
    pub fn entry(&self) -> &EnvironmentEntry {
        &self.entry
    }
}

impl Disposable for HeadlessEnvironment {
    async fn dispose(self) {
        let mut scene = lock(&self.scene);
        if scene.environment.as_ref().map(|e| e.id) == Some(self.entry.id) {
            scene.environment = None;
        }
        debug!(id = self.entry.id, "Disposed environment");
    }
}

impl SceneEngine for HeadlessEngine {
    type Model = HeadlessModel;
    type Environment = HeadlessEnvironment;

    async fn import_model(&self, url: &str) -> Result<HeadlessModel> {
        let bytes = self.fetcher.fetch(url).await?;
        let summary = gltf::parse(&bytes).with_context(|| format!("Failed to parse model {}", url))?;

        let entry = ModelEntry {
            id: self.next_id(),
            url: url.to_string(),
            bytes: bytes.len(),
            meshes: summary.meshes,
            bounds: summary.bounds,
        };
        debug!(url = %url, meshes = entry.meshes, bounds = ?entry.bounds, "Imported model");

        Ok(HeadlessModel {
            entry,
            scene: self.scene.clone(),
        })
    }

    async fn import_environment(&self, request: &EnvironmentRequest) -> Result<HeadlessEnvironment> {
        let bytes = match request.url() {
            Some(url) => self.fetcher.fetch(url).await?.len(),
            None => 0,
        };

        Ok(HeadlessEnvironment {
            entry: EnvironmentEntry {
                id: self.next_id(),
                request: request.clone(),
                bytes,
            },
            scene: self.scene.clone(),
        })
    }

    fn add_model_to_scene(&self, model: &HeadlessModel) {
        lock(&self.scene).models.push(model.entry.clone());
    }

    fn attach_environment(&self, environment: &HeadlessEnvironment) {
        lock(&self.scene).environment = Some(environment.entry.clone());
    }

    fn world_bounds(&self) -> Option<Bounds> {
        lock(&self.scene)
            .models
            .iter()
            .filter_map(|m| m.bounds)
            .reduce(|a, b| a.union(&b))
    }

    fn apply_camera(&self, framing: &CameraFraming) {
        lock(&self.scene).camera = Some(*framing);
    }

    fn set_auto_clear(&self, auto_clear: bool) {
        lock(&self.scene).auto_clear = auto_clear;
    }

    fn set_clear_color(&self, color: Color4) {
        lock(&self.scene).clear_color = Some(color);
    }

    fn run_render_loop(&self) {
        lock(&self.scene).rendering = true;
    }

    fn dispose(&self) {
        let mut scene = lock(&self.scene);
        scene.rendering = false;
        scene.disposed = true;
        scene.models.clear();
        scene.environment = None;
        info!("Headless engine disposed");
    }
}

/// Creates [`HeadlessEngine`]s sharing one fetcher
#[derive(Clone)]
pub struct HeadlessProvider {
    fetcher: AssetFetcher,
}

impl HeadlessProvider {
    pub fn new(fetcher: AssetFetcher) -> Self {
        Self { fetcher }
    }
}

impl EngineProvider<HeadlessSurface> for HeadlessProvider {
    type Engine = HeadlessEngine;

    fn create_engine(&self, surface: HeadlessSurface, options: &EngineOptions) -> Result<HeadlessEngine> {
        if surface.width == 0 || surface.height == 0 {
            bail!("surface {}x{} has no drawable area", surface.width, surface.height);
        }
        Ok(HeadlessEngine::new(surface, options, self.fetcher.clone()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
