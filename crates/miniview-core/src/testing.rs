//! In-memory engine for exercising the viewer without a renderer
//!
//! [`ScriptedEngine`] records every call it receives and lets tests hold an
//! import open, make it fail, or give a model specific bounds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

use crate::engine::{Disposable, SceneEngine};
use crate::environment::EnvironmentRequest;
use crate::framing::{Bounds, CameraFraming};
use crate::options::Color4;

/// Observable scene state of a [`ScriptedEngine`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneRecord {
    /// Urls of models currently in the scene
    pub models: Vec<String>,
    /// Url of the attached environment, `"<default light>"` for the light
    pub environment: Option<String>,
    pub camera: Option<CameraFraming>,
    pub auto_clear: Option<bool>,
    pub clear_color: Option<Color4>,
    pub rendering: bool,
    pub disposed: bool,
}

struct HeldImport {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Inner {
    scene: Mutex<SceneRecord>,
    events: Mutex<Vec<String>>,
    imports: Mutex<Vec<String>>,
    disposals: Mutex<Vec<String>>,
    /// Installed models by id; `SceneRecord::models` is derived from it
    installed: Mutex<Vec<(u64, String)>>,
    attached: Mutex<Option<u64>>,
    held: Mutex<HashMap<String, HeldImport>>,
    failures: Mutex<HashMap<String, String>>,
    panics: Mutex<Vec<String>>,
    bounds: Mutex<HashMap<String, Bounds>>,
    next_id: AtomicU64,
}

impl Inner {
    fn log(&self, event: String) {
        lock(&self.events).push(event);
    }
}

/// Engine double that records calls and can be scripted per url
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    inner: Arc<Inner>,
}

/// Keeps an import of one url open until released
pub struct Gate {
    entered: Option<oneshot::Receiver<()>>,
    release: oneshot::Sender<()>,
}

impl Gate {
    /// Wait until the held import has started
    pub async fn entered(&mut self) {
        if let Some(entered) = self.entered.take() {
            let _ = entered.await;
        }
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the next import of `url` open until the gate is released
    pub fn hold(&self, url: &str) -> Gate {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        lock(&self.inner.held).insert(
            url.to_string(),
            HeldImport {
                entered: entered_tx,
                release: release_rx,
            },
        );
        Gate {
            entered: Some(entered_rx),
            release: release_tx,
        }
    }

    /// Make imports of `url` fail with `message`
    pub fn fail(&self, url: &str, message: &str) {
        lock(&self.inner.failures).insert(url.to_string(), message.to_string());
    }

    /// Make imports of `url` panic
    pub fn panic_on(&self, url: &str) {
        lock(&self.inner.panics).push(url.to_string());
    }

    pub fn set_bounds(&self, url: &str, bounds: Bounds) {
        lock(&self.inner.bounds).insert(url.to_string(), bounds);
    }

    pub fn scene(&self) -> SceneRecord {
        let mut scene = lock(&self.inner.scene).clone();
        scene.models = lock(&self.inner.installed)
            .iter()
            .map(|(_, url)| url.clone())
            .collect();
        scene
    }

    /// Every engine call in order, e.g. `"import a.glb"`, `"add a.glb"`
    pub fn events(&self) -> Vec<String> {
        lock(&self.inner.events).clone()
    }

    /// Urls passed to the import routines, in call order
    pub fn imports(&self) -> Vec<String> {
        lock(&self.inner.imports).clone()
    }

    /// Urls of disposed resources, in disposal order
    pub fn disposals(&self) -> Vec<String> {
        lock(&self.inner.disposals).clone()
    }

    async fn import(&self, url: &str) -> anyhow::Result<(u64, Arc<Inner>)> {
        lock(&self.inner.imports).push(url.to_string());
        self.inner.log(format!("import {}", url));

        let held = lock(&self.inner.held).remove(url);
        if let Some(held) = held {
            let _ = held.entered.send(());
            let _ = held.release.await;
        }

        let panics = lock(&self.inner.panics).iter().any(|u| u == url);
        if panics {
            panic!("scripted panic importing {}", url);
        }

        let failure = lock(&self.inner.failures).get(url).cloned();
        if let Some(message) = failure {
            anyhow::bail!("{}", message);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        Ok((id, self.inner.clone()))
    }
}

/// Model produced by [`ScriptedEngine`]
pub struct ScriptedModel {
    pub id: u64,
    pub url: String,
    inner: Arc<Inner>,
}

impl Disposable for ScriptedModel {
    async fn dispose(self) {
        lock(&self.inner.installed).retain(|(id, _)| *id != self.id);
        lock(&self.inner.disposals).push(self.url.clone());
        self.inner.log(format!("dispose {}", self.url));
    }
}

/// Environment produced by [`ScriptedEngine`]
pub struct ScriptedEnvironment {
    pub id: u64,
    pub label: String,
    inner: Arc<Inner>,
}

impl Disposable for ScriptedEnvironment {
    async fn dispose(self) {
        {
            let mut attached = lock(&self.inner.attached);
            if *attached == Some(self.id) {
                *attached = None;
                lock(&self.inner.scene).environment = None;
            }
        }
        lock(&self.inner.disposals).push(self.label.clone());
        self.inner.log(format!("dispose {}", self.label));
    }
}

impl SceneEngine for ScriptedEngine {
    type Model = ScriptedModel;
    type Environment = ScriptedEnvironment;

    async fn import_model(&self, url: &str) -> anyhow::Result<ScriptedModel> {
        let (id, inner) = self.import(url).await?;
        Ok(ScriptedModel {
            id,
            url: url.to_string(),
            inner,
        })
    }

    async fn import_environment(
        &self,
        request: &EnvironmentRequest,
    ) -> anyhow::Result<ScriptedEnvironment> {
        let label = request.url().unwrap_or("<default light>").to_string();
        let (id, inner) = self.import(&label).await?;
        Ok(ScriptedEnvironment { id, label, inner })
    }

    fn add_model_to_scene(&self, model: &ScriptedModel) {
        lock(&self.inner.installed).push((model.id, model.url.clone()));
        self.inner.log(format!("add {}", model.url));
    }

    fn attach_environment(&self, environment: &ScriptedEnvironment) {
        *lock(&self.inner.attached) = Some(environment.id);
        lock(&self.inner.scene).environment = Some(environment.label.clone());
        self.inner.log(format!("attach {}", environment.label));
    }

    fn world_bounds(&self) -> Option<Bounds> {
        let installed = lock(&self.inner.installed);
        let bounds = lock(&self.inner.bounds);
        installed
            .iter()
            .filter_map(|(_, url)| bounds.get(url))
            .fold(None, |acc: Option<Bounds>, b| {
                Some(acc.map(|a| a.union(b)).unwrap_or(*b))
            })
    }

    fn apply_camera(&self, framing: &CameraFraming) {
        lock(&self.inner.scene).camera = Some(*framing);
        self.inner.log("camera".to_string());
    }

    fn set_auto_clear(&self, auto_clear: bool) {
        lock(&self.inner.scene).auto_clear = Some(auto_clear);
    }

    fn set_clear_color(&self, color: Color4) {
        lock(&self.inner.scene).clear_color = Some(color);
    }

    fn run_render_loop(&self) {
        lock(&self.inner.scene).rendering = true;
    }

    fn dispose(&self) {
        let mut scene = lock(&self.inner.scene);
        scene.rendering = false;
        scene.disposed = true;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
