//! Interfaces to the rendering engine
//!
//! The viewer never touches GPU state directly. Everything it needs from an
//! engine (importing assets, adding them to the scene, positioning the
//! camera) goes through [`SceneEngine`]; creating an engine for a drawing
//! surface goes through [`EngineProvider`].

use std::future::Future;

use crate::environment::EnvironmentRequest;
use crate::framing::{Bounds, CameraFraming};
use crate::options::{Color4, EngineOptions};

/// A loaded asset that must be released explicitly
pub trait Disposable: Send + 'static {
    /// Remove the asset from its scene and free its resources
    fn dispose(self) -> impl Future<Output = ()> + Send;
}

/// Engine, scene and camera of one viewer
pub trait SceneEngine: Send + Sync + 'static {
    /// Imported model (meshes, materials, animations) not yet in the scene
    type Model: Disposable;
    /// Environment lighting, possibly with a skybox
    type Environment: Disposable;

    /// Fetch and parse a model. May take arbitrarily long.
    fn import_model(&self, url: &str) -> impl Future<Output = anyhow::Result<Self::Model>> + Send;

    /// Build an environment from a request. May take arbitrarily long.
    fn import_environment(
        &self,
        request: &EnvironmentRequest,
    ) -> impl Future<Output = anyhow::Result<Self::Environment>> + Send;

    fn add_model_to_scene(&self, model: &Self::Model);

    fn attach_environment(&self, environment: &Self::Environment);

    /// Bounds of all visible, enabled meshes, if any
    fn world_bounds(&self) -> Option<Bounds>;

    fn apply_camera(&self, framing: &CameraFraming);

    fn set_auto_clear(&self, auto_clear: bool);

    fn set_clear_color(&self, color: Color4);

    /// Start rendering frames continuously
    fn run_render_loop(&self);

    /// Stop rendering and release the scene
    fn dispose(&self);
}

/// Creates engines bound to a drawing surface of type `S`
pub trait EngineProvider<S> {
    type Engine: SceneEngine;

    fn create_engine(&self, surface: S, options: &EngineOptions) -> anyhow::Result<Self::Engine>;
}
