//! Miniview Core - Load sequencing and scene setup for the mini viewer
//!
//! This crate provides the engine-independent parts of the viewer:
//! - An async operation sequencer that runs queued work one item at a time
//! - Generation-stamped load tokens for "latest request wins" supersession
//! - The viewer coordinator that owns one model and one environment slot
//! - Camera framing and environment/skybox defaults
//!
//! Rendering, asset import and the scene graph are supplied by an
//! implementation of [`engine::SceneEngine`].

pub mod cancel;
pub mod engine;
pub mod environment;
pub mod error;
pub mod framing;
pub mod options;
pub mod sequencer;
pub mod slot;
pub mod viewer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cancel::{CancelSignal, CancelSource, LoadToken};
pub use engine::{Disposable, EngineProvider, SceneEngine};
pub use environment::{DefaultSkybox, EnvironmentFormat, EnvironmentRequest, DEFAULT_SKYBOXES};
pub use error::{SequencerError, ViewerError};
pub use framing::{Bounds, CameraFraming};
pub use options::{Color4, EngineOptions, ViewerOptions};
pub use sequencer::{Sequenced, Sequencer};
pub use slot::ResourceSlot;
pub use viewer::{LoadOutcome, LoadRequest, LoadState, ResourceKind, Viewer};
