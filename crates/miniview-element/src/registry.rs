//! Element registration
//!
//! Hosts define element tags once at startup and instantiate elements by
//! tag afterwards. Tag names follow the custom element rules: lowercase
//! ASCII, starting with a letter, containing at least one hyphen.

use miniview_core::{EngineProvider, SceneEngine};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::element::ViewerElement;
use crate::factory::{create_viewer_for_surface, SurfaceViewerOptions};

/// Tag used by [`register_custom_elements`]
pub const DEFAULT_TAG: &str = "mini-viewer";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("'{0}' is not a valid element name")]
    InvalidName(String),
    #[error("element '{0}' is already defined")]
    AlreadyDefined(String),
    #[error("element '{0}' is not defined")]
    NotDefined(String),
    #[error("failed to create element '{tag}': {source}")]
    Create {
        tag: String,
        #[source]
        source: anyhow::Error,
    },
}

type ElementFactory<S, E> = Box<dyn Fn(S) -> anyhow::Result<ViewerElement<E>> + Send + Sync>;

/// Tag to element factory map
pub struct ElementRegistry<S, E: SceneEngine> {
    definitions: HashMap<String, ElementFactory<S, E>>,
}

impl<S, E: SceneEngine> ElementRegistry<S, E> {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    pub fn define<F>(&mut self, tag: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(S) -> anyhow::Result<ViewerElement<E>> + Send + Sync + 'static,
    {
        if !is_valid_tag(tag) {
            return Err(RegistryError::InvalidName(tag.to_string()));
        }
        if self.definitions.contains_key(tag) {
            return Err(RegistryError::AlreadyDefined(tag.to_string()));
        }

        self.definitions.insert(tag.to_string(), Box::new(factory));
        info!(tag, "Defined viewer element");
        Ok(())
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.definitions.contains_key(tag)
    }

    /// Instantiate the element registered for `tag` on a surface
    pub fn create(&self, tag: &str, surface: S) -> Result<ViewerElement<E>, RegistryError> {
        let factory = self
            .definitions
            .get(tag)
            .ok_or_else(|| RegistryError::NotDefined(tag.to_string()))?;

        factory(surface).map_err(|source| RegistryError::Create {
            tag: tag.to_string(),
            source,
        })
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.definitions.keys().map(|t| t.as_str()).collect();
        tags.sort_unstable();
        tags
    }
}

impl<S, E: SceneEngine> Default for ElementRegistry<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Define [`DEFAULT_TAG`], backed by engines from `provider`
pub fn register_custom_elements<P, S>(
    registry: &mut ElementRegistry<S, P::Engine>,
    provider: P,
) -> Result<(), RegistryError>
where
    P: EngineProvider<S> + Send + Sync + 'static,
{
    registry.define(DEFAULT_TAG, move |surface| {
        let viewer = create_viewer_for_surface(&provider, surface, SurfaceViewerOptions::default())?;
        Ok(ViewerElement::new(viewer))
    })
}

fn is_valid_tag(tag: &str) -> bool {
    tag.starts_with(|c: char| c.is_ascii_lowercase())
        && tag.contains('-')
        && tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
}
