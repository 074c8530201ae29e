//! Miniview Headless - A GPU-less scene engine for the miniview viewer
//!
//! Fetches and parses glTF models so the load coordinator can run end to
//! end from the command line or in tests, without a window or a GPU.

pub mod config;
pub mod engine;
pub mod fetch;
pub mod gltf;

pub use engine::{HeadlessEngine, HeadlessProvider, HeadlessSurface, SceneSnapshot};
pub use fetch::AssetFetcher;
