//! Viewer element: attribute-driven loading
//!
//! Mirrors the behavior of a `<mini-viewer src="..." env="...">` element.
//! Every change to an observed attribute issues a load on the bound viewer.
//! Outcomes are logged and never propagate to the host.

use miniview_core::{CancelSignal, LoadOutcome, LoadRequest, ResourceKind, SceneEngine, Viewer, ViewerError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Attributes whose changes trigger a load
pub const OBSERVED_ATTRIBUTES: [&str; 2] = ["src", "env"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedAttribute {
    /// Model url
    Src,
    /// Environment url; absent means the default light
    Env,
}

impl ObservedAttribute {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "src" => Some(Self::Src),
            "env" => Some(Self::Env),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Src => "src",
            Self::Env => "env",
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Src => ResourceKind::Model,
            Self::Env => ResourceKind::Environment,
        }
    }
}

/// Host element bound to one viewer
pub struct ViewerElement<E: SceneEngine> {
    viewer: Arc<Viewer<E>>,
    attributes: Mutex<HashMap<String, String>>,
}

impl<E: SceneEngine> ViewerElement<E> {
    pub fn new(viewer: Viewer<E>) -> Self {
        Self {
            viewer: Arc::new(viewer),
            attributes: Mutex::new(HashMap::new()),
        }
    }

    pub fn viewer(&self) -> &Arc<Viewer<E>> {
        &self.viewer
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        lock(&self.attributes).get(name).cloned()
    }

    /// Set an attribute and run the change callback, as a browser would
    pub fn set_attribute(&self, name: &str, value: &str) -> Option<JoinHandle<()>> {
        let old = lock(&self.attributes).insert(name.to_string(), value.to_string());
        self.attribute_changed(name, old.as_deref(), Some(value))
    }

    pub fn remove_attribute(&self, name: &str) -> Option<JoinHandle<()>> {
        let old = lock(&self.attributes).remove(name)?;
        self.attribute_changed(name, Some(&old), None)
    }

    pub fn src(&self) -> Option<String> {
        self.get_attribute("src")
    }

    pub fn set_src(&self, value: Option<&str>) -> Option<JoinHandle<()>> {
        match value {
            Some(value) => self.set_attribute("src", value),
            None => self.remove_attribute("src"),
        }
    }

    pub fn env(&self) -> Option<String> {
        self.get_attribute("env")
    }

    pub fn set_env(&self, value: Option<&str>) -> Option<JoinHandle<()>> {
        match value {
            Some(value) => self.set_attribute("env", value),
            None => self.remove_attribute("env"),
        }
    }

    /// React to an attribute change.
    ///
    /// Returns the task reporting the load outcome, or `None` when the
    /// attribute is not observed or nothing needs loading. The task never
    /// fails; awaiting it is optional.
    pub fn attribute_changed(
        &self,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Option<JoinHandle<()>> {
        let attribute = ObservedAttribute::from_name(name)?;
        debug!(attribute = name, ?old, ?new, "Attribute changed");

        if attribute == ObservedAttribute::Src && new.is_none() {
            // Removing src keeps the current model
            return None;
        }

        let kind = attribute.kind();
        let request = self.viewer.load(kind, new, CancelSignal::never());
        Some(tokio::spawn(report_outcome(kind, new.map(str::to_string), request)))
    }

    pub fn connected(&self) {
        debug!("Viewer element connected");
    }

    /// Release the viewer once the element leaves the page
    pub async fn disconnected(&self) {
        self.viewer.dispose().await;
    }
}

async fn report_outcome(kind: ResourceKind, url: Option<String>, request: LoadRequest) {
    let url = url.as_deref().unwrap_or("<default>");
    match request.await {
        Ok(LoadOutcome::Applied) => info!(kind = %kind, url, "Element load applied"),
        Ok(LoadOutcome::Superseded) => debug!(kind = %kind, url, "Element load superseded"),
        Err(e @ ViewerError::Disposed) => {
            error!(kind = %kind, url, error = %e, "Element used after its viewer was disposed")
        }
        Err(e) => error!(kind = %kind, url, error = %e, "Element load failed"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniview_core::testing::ScriptedEngine;
    use miniview_core::{LoadState, ViewerOptions};

    fn element() -> (ScriptedEngine, ViewerElement<ScriptedEngine>) {
        let engine = ScriptedEngine::new();
        let element = ViewerElement::new(Viewer::new(engine.clone(), ViewerOptions::default()));
        (engine, element)
    }

    #[test]
    fn test_observed_attributes() {
        for name in OBSERVED_ATTRIBUTES {
            let attribute = ObservedAttribute::from_name(name).unwrap();
            assert_eq!(attribute.name(), name);
        }
        assert_eq!(ObservedAttribute::from_name("width"), None);
        assert_eq!(ObservedAttribute::Src.kind(), ResourceKind::Model);
        assert_eq!(ObservedAttribute::Env.kind(), ResourceKind::Environment);
    }

    #[tokio::test]
    async fn test_src_attribute_loads_model() {
        let (engine, element) = element();

        element.set_src(Some("a.glb")).unwrap().await.unwrap();

        assert_eq!(element.src().as_deref(), Some("a.glb"));
        assert_eq!(engine.scene().models, vec!["a.glb".to_string()]);
    }

    #[tokio::test]
    async fn test_rapid_src_changes_keep_last() {
        let (engine, element) = element();
        let mut gate = engine.hold("a.glb");

        let first = element.set_src(Some("a.glb")).unwrap();
        gate.entered().await;
        let second = element.set_src(Some("b.glb")).unwrap();
        gate.release();

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(engine.scene().models, vec!["b.glb".to_string()]);
        assert_eq!(element.src().as_deref(), Some("b.glb"));
    }

    #[tokio::test]
    async fn test_env_attribute_and_removal() {
        let (engine, element) = element();

        element.set_env(Some("studio.env")).unwrap().await.unwrap();
        assert_eq!(engine.scene().environment.as_deref(), Some("studio.env"));
        assert_eq!(engine.scene().auto_clear, Some(false));

        element.set_env(None).unwrap().await.unwrap();
        assert_eq!(engine.scene().environment.as_deref(), Some("<default light>"));
        assert_eq!(engine.scene().auto_clear, Some(true));
    }

    #[tokio::test]
    async fn test_failed_load_is_logged_not_propagated() {
        let (engine, element) = element();
        engine.fail("missing.glb", "404 Not Found");

        // The reporting task completes normally
        element.set_src(Some("missing.glb")).unwrap().await.unwrap();

        assert!(matches!(
            element.viewer().load_state(ResourceKind::Model),
            LoadState::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_unobserved_and_removed_src_do_nothing() {
        let (engine, element) = element();
        assert!(element.set_attribute("width", "300").is_none());
        assert_eq!(element.get_attribute("width").as_deref(), Some("300"));

        element.set_src(Some("a.glb")).unwrap().await.unwrap();
        assert!(element.set_src(None).is_none());
        assert_eq!(element.src(), None);
        assert_eq!(engine.scene().models, vec!["a.glb".to_string()]);
    }

    #[tokio::test]
    async fn test_changes_after_disconnect_are_swallowed() {
        let (engine, element) = element();
        element.connected();
        element.set_src(Some("a.glb")).unwrap().await.unwrap();
        element.disconnected().await;

        element.set_src(Some("b.glb")).unwrap().await.unwrap();
        assert!(element.viewer().is_disposed());
        assert_eq!(engine.imports(), vec!["a.glb".to_string()]);
        assert!(engine.scene().disposed);
    }
}
