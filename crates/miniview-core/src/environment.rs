//! Environment lighting and skybox requests

use serde::{Deserialize, Serialize};

use crate::framing::CameraFraming;

/// Blur applied to the skybox reflection (0 = sharp)
pub const SKYBOX_BLUR: f32 = 0.3;

/// How an environment texture should be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentFormat {
    /// Equirectangular `.hdr` image converted to a cube at load time
    Hdr,
    /// Prefiltered cube data (`.env`, `.dds`)
    Prefiltered,
}

impl EnvironmentFormat {
    /// Pick the decoder from the url's extension, ignoring query and fragment
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.to_ascii_lowercase().ends_with(".hdr") {
            Self::Hdr
        } else {
            Self::Prefiltered
        }
    }
}

/// Entry in the built-in skybox catalog
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultSkybox {
    pub url: &'static str,
    /// Rotation around Y, in radians
    pub rotation_y: f32,
}

pub const DEFAULT_SKYBOXES: [DefaultSkybox; 3] = [
    DefaultSkybox {
        url: "https://assets.babylonjs.com/environments/sanGiuseppeBridge.env",
        rotation_y: 5.54,
    },
    DefaultSkybox {
        url: "https://assets.babylonjs.com/environments/ulmerMuenster.env",
        rotation_y: 1.9,
    },
    DefaultSkybox {
        url: "https://assets.babylonjs.com/environments/studio.env",
        rotation_y: 0.0,
    },
];

impl Default for DefaultSkybox {
    fn default() -> Self {
        DEFAULT_SKYBOXES[1]
    }
}

/// What the engine should build for an environment load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvironmentRequest {
    /// Hemispheric ambient light, cleared background
    DefaultLight,
    /// Environment texture plus a skybox box around the scene
    Skybox {
        url: String,
        format: EnvironmentFormat,
        rotation_y: f32,
        /// Edge length of the skybox box
        scale: f32,
        blur: f32,
    },
}

impl EnvironmentRequest {
    /// Build the request for an optional url, sizing the skybox to the
    /// current camera depth range.
    pub fn for_url(url: Option<&str>, framing: &CameraFraming) -> Self {
        match url.map(str::trim).filter(|u| !u.is_empty()) {
            None => Self::DefaultLight,
            Some(url) => {
                let rotation_y = DEFAULT_SKYBOXES
                    .iter()
                    .find(|s| s.url == url)
                    .map(|s| s.rotation_y)
                    .unwrap_or(0.0);
                Self::Skybox {
                    url: url.to_string(),
                    format: EnvironmentFormat::from_url(url),
                    rotation_y,
                    scale: framing.depth_range() / 2.0,
                    blur: SKYBOX_BLUR,
                }
            }
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::DefaultLight => None,
            Self::Skybox { url, .. } => Some(url),
        }
    }

    /// Whether the scene must clear its background each frame. A skybox
    /// covers the whole background so clearing is skipped.
    pub fn auto_clear(&self) -> bool {
        matches!(self, Self::DefaultLight)
    }
}
