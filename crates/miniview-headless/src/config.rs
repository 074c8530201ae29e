//! Configuration loading

use anyhow::Result;
use miniview_core::{EngineOptions, ViewerOptions};
use miniview_element::SurfaceViewerOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::engine::HeadlessSurface;
use crate::fetch::{AssetFetcher, DEFAULT_TIMEOUT_SECS};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub viewer: ViewerOptions,
    #[serde(default)]
    pub engine: EngineOptions,
    #[serde(default)]
    pub surface: HeadlessSurface,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
}

impl Config {
    pub fn surface_options(&self) -> SurfaceViewerOptions {
        SurfaceViewerOptions {
            viewer: self.viewer.clone(),
            engine: self.engine.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout for remote assets in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Directory relative asset paths are resolved against
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            base_dir: None,
        }
    }
}

impl FetchConfig {
    pub fn build_fetcher(&self) -> Result<AssetFetcher> {
        let fetcher = AssetFetcher::new(Duration::from_secs(self.timeout_secs))?;
        Ok(match &self.base_dir {
            Some(dir) => fetcher.with_base_dir(dir),
            None => fetcher,
        })
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment loaded when none is given on the command line.
    /// Absent means the default hemispheric light.
    #[serde(default)]
    pub url: Option<String>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        environment: EnvironmentConfig {
            url: Some(miniview_core::DefaultSkybox::default().url.to_string()),
        },
        ..Default::default()
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniview_core::Color4;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.viewer.background_color, Color4::new(0.1, 0.1, 0.2, 1.0));
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("miniview.toml");
        std::fs::write(
            &path,
            r#"
[engine]
antialias = false

[fetch]
base_dir = "/srv/assets"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert!(!config.engine.antialias);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.base_dir, Some(PathBuf::from("/srv/assets")));
        assert_eq!(config.surface, HeadlessSurface::default());
        assert!(!config.surface_options().engine.antialias);
    }

    #[test]
    fn test_saved_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("miniview.toml");
        save_default_config(&path).unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.environment.url.as_deref().unwrap_or("").ends_with(".env"));
        assert_eq!(config.viewer, ViewerOptions::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("miniview.toml");
        std::fs::write(&path, "[fetch]\ntimeout_secs = \"soon\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
