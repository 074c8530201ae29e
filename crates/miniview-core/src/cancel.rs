//! Cancellation tokens for load supersession
//!
//! Two kinds of cancellation compose on every load request:
//! - [`LoadToken`]: internal, owned by a resource slot. Issuing a newer
//!   request cancels the previous token.
//! - [`CancelSignal`]: external, handed in by the caller and triggered
//!   through its [`CancelSource`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Generation-stamped cancellation token for one load request
#[derive(Debug, Clone)]
pub struct LoadToken {
    generation: u64,
    canceled: Arc<AtomicBool>,
}

impl LoadToken {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            generation,
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Monotonic identity of the request within its slot
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

/// Caller-owned trigger for a [`CancelSignal`]
#[derive(Debug, Clone, Default)]
pub struct CancelSource {
    flag: Arc<AtomicBool>,
}

impl CancelSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal to pass along with a load request
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            flag: Some(self.flag.clone()),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Read side of an external cancellation request
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Option<Arc<AtomicBool>>,
}

impl CancelSignal {
    /// A signal that is never triggered
    pub fn never() -> Self {
        Self { flag: None }
    }

    pub fn is_canceled(&self) -> bool {
        self.flag
            .as_ref()
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}
