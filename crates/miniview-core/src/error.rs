//! Error types for sequencing and viewer loads

use thiserror::Error;

use crate::viewer::ResourceKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencerError {
    /// The worker stopped before the operation could be queued
    #[error("sequencer is closed")]
    Closed,
    /// The operation panicked or was dropped before producing a result
    #[error("operation was abandoned before completing")]
    Abandoned,
}

#[derive(Error, Debug)]
pub enum ViewerError {
    /// Loading on a viewer after `dispose()` is a programming error
    #[error("viewer is disposed")]
    Disposed,
    #[error("failed to load {kind} from '{url}': {source}")]
    LoadFailed {
        kind: ResourceKind,
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

impl ViewerError {
    /// Whether this error means the viewer itself is unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, ViewerError::Disposed)
    }
}
