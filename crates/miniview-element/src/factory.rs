//! Viewer creation from a drawing surface
//!
//! Shared by every host integration so they all build viewers the same way.

use anyhow::{Context, Result};
use miniview_core::{EngineOptions, EngineProvider, Viewer, ViewerOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Viewer and engine options for a surface-backed viewer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceViewerOptions {
    #[serde(default)]
    pub viewer: ViewerOptions,
    #[serde(default)]
    pub engine: EngineOptions,
}

/// Where a viewer gets its engine from
pub enum ViewerSource<S, E> {
    /// Create a new engine for this surface
    Surface(S),
    /// Use an engine the host already created
    Engine(E),
}

/// Create an engine for `surface` and wrap it in a viewer.
///
/// Fails without creating an engine when called outside a Tokio runtime.
pub fn create_viewer_for_surface<P, S>(
    provider: &P,
    surface: S,
    options: SurfaceViewerOptions,
) -> Result<Viewer<P::Engine>>
where
    P: EngineProvider<S>,
{
    create_viewer(provider, ViewerSource::Surface(surface), options)
}

pub fn create_viewer<P, S>(
    provider: &P,
    source: ViewerSource<S, P::Engine>,
    options: SurfaceViewerOptions,
) -> Result<Viewer<P::Engine>>
where
    P: EngineProvider<S>,
{
    // Viewers run their load queues as Tokio tasks
    tokio::runtime::Handle::try_current().context("Viewer creation requires a Tokio runtime")?;

    let engine = match source {
        ViewerSource::Surface(surface) => {
            debug!(antialias = options.engine.antialias, "Creating engine for surface");
            provider
                .create_engine(surface, &options.engine)
                .context("Failed to create engine for surface")?
        }
        ViewerSource::Engine(engine) => engine,
    };

    Ok(Viewer::new(engine, options.viewer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniview_core::testing::ScriptedEngine;
    use miniview_core::Color4;
    use std::sync::Mutex;

    /// Provider that records the options it was asked to use
    #[derive(Default)]
    struct RecordingProvider {
        seen: Mutex<Vec<(String, EngineOptions)>>,
    }

    impl EngineProvider<&'static str> for RecordingProvider {
        type Engine = ScriptedEngine;

        fn create_engine(&self, surface: &'static str, options: &EngineOptions) -> Result<ScriptedEngine> {
            if surface.is_empty() {
                anyhow::bail!("surface has no rendering context");
            }
            self.seen.lock().unwrap().push((surface.to_string(), options.clone()));
            Ok(ScriptedEngine::new())
        }
    }

    #[tokio::test]
    async fn test_create_viewer_for_surface_forwards_options() {
        let provider = RecordingProvider::default();
        let options = SurfaceViewerOptions {
            viewer: ViewerOptions {
                background_color: Color4::new(1.0, 1.0, 1.0, 1.0),
            },
            engine: EngineOptions {
                antialias: false,
                preserve_drawing_buffer: true,
            },
        };

        let viewer = create_viewer_for_surface(&provider, "canvas", options.clone()).unwrap();

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "canvas");
        assert!(!seen[0].1.antialias);
        assert_eq!(viewer.engine().scene().clear_color, Some(options.viewer.background_color));
        assert!(viewer.engine().scene().rendering);
    }

    #[tokio::test]
    async fn test_pre_built_engine_skips_provider() {
        let provider = RecordingProvider::default();
        let engine = ScriptedEngine::new();

        let viewer = create_viewer(
            &provider,
            ViewerSource::Engine(engine.clone()),
            SurfaceViewerOptions::default(),
        )
        .unwrap();

        assert!(provider.seen.lock().unwrap().is_empty());
        assert_eq!(viewer.options(), &ViewerOptions::default());
        assert!(engine.scene().rendering);
    }

    #[tokio::test]
    async fn test_engine_creation_failure_is_reported() {
        let provider = RecordingProvider::default();
        let err = create_viewer_for_surface(&provider, "", SurfaceViewerOptions::default())
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("no rendering context"));
    }

    #[test]
    fn test_outside_runtime_is_an_error() {
        let provider = RecordingProvider::default();
        let err = create_viewer_for_surface(&provider, "canvas", SurfaceViewerOptions::default())
            .err()
            .unwrap();

        assert!(err.to_string().contains("requires a Tokio runtime"));
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: SurfaceViewerOptions =
            serde_json::from_str(r#"{"engine": {"antialias": false}}"#).unwrap();
        assert!(!options.engine.antialias);
        assert_eq!(options.viewer, ViewerOptions::default());
    }
}
