//! Asset fetching
//!
//! `http://` and `https://` urls go through a shared reqwest client. Plain
//! paths and `file://` urls are read from disk, relative paths resolved
//! against an optional base directory.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for remote assets
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where an asset url points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    Remote(String),
    Local(PathBuf),
}

/// Fetches model and environment bytes
#[derive(Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
    base_dir: Option<PathBuf>,
}

impl AssetFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_dir: None,
        })
    }

    /// Resolve relative paths against `dir` instead of the working directory
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn locate(&self, url: &str) -> AssetLocation {
        if url.starts_with("http://") || url.starts_with("https://") {
            return AssetLocation::Remote(url.to_string());
        }

        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.base_dir {
            Some(base) if path.is_relative() => AssetLocation::Local(base.join(path)),
            _ => AssetLocation::Local(path.to_path_buf()),
        }
    }

    /// Read the full contents of the asset at `url`
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match self.locate(url) {
            AssetLocation::Remote(url) => self.fetch_remote(&url).await,
            AssetLocation::Local(path) => {
                debug!(path = %path.display(), "Reading local asset");
                tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))
            }
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        info!(url = %url, "Fetching remote asset");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), "Asset fetch returned non-success status");
            bail!("{} returned {}", url, response.status());
        }

        let content = response
            .bytes()
            .await
            .context("Failed to read asset response body")?;

        debug!(url = %url, bytes = content.len(), "Fetched remote asset");
        Ok(content.to_vec())
    }
}
