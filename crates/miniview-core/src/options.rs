//! Viewer and engine options

use serde::{Deserialize, Serialize};

/// RGBA color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color4 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color4 {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// Options for a [`crate::Viewer`]. Missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerOptions {
    #[serde(default = "default_background_color")]
    pub background_color: Color4,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            background_color: default_background_color(),
        }
    }
}

fn default_background_color() -> Color4 {
    Color4::new(0.1, 0.1, 0.2, 1.0)
}

/// Options forwarded to an [`crate::EngineProvider`] when creating an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    #[serde(default = "default_true")]
    pub antialias: bool,
    /// Preserve the drawing buffer between frames (screenshots)
    #[serde(default)]
    pub preserve_drawing_buffer: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            antialias: true,
            preserve_drawing_buffer: false,
        }
    }
}

fn default_true() -> bool {
    true
}
