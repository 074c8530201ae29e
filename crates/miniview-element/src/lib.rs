//! Miniview Element - Host page integration for the mini viewer
//!
//! This crate binds a drawing surface to a [`miniview_core::Viewer`]:
//! - [`factory`] creates viewers from a surface or a pre-built engine
//! - [`element`] mirrors the `src`/`env` attributes of a viewer element
//! - [`registry`] is the define-once registration capability for hosts

pub mod element;
pub mod factory;
pub mod registry;

pub use element::{ObservedAttribute, ViewerElement, OBSERVED_ATTRIBUTES};
pub use factory::{create_viewer, create_viewer_for_surface, SurfaceViewerOptions, ViewerSource};
pub use registry::{register_custom_elements, ElementRegistry, RegistryError, DEFAULT_TAG};
