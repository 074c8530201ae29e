//! Per-kind holder of the applied resource and the current load token

use std::sync::{Mutex, MutexGuard};

use crate::cancel::LoadToken;

struct TokenState {
    current: LoadToken,
    next_generation: u64,
}

/// Holds the currently applied resource of one kind and the token of the
/// most recent load request for it.
///
/// The token is swapped when a request is submitted; the resource is only
/// replaced from inside a sequenced load step. Neither lock is held across
/// an await.
pub struct ResourceSlot<R> {
    tokens: Mutex<TokenState>,
    resource: Mutex<Option<R>>,
}

impl<R> ResourceSlot<R> {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(TokenState {
                current: LoadToken::new(0),
                next_generation: 1,
            }),
            resource: Mutex::new(None),
        }
    }

    /// Issue a token for a new request, canceling the previous one
    pub fn issue_token(&self) -> LoadToken {
        let mut tokens = lock(&self.tokens);
        tokens.current.cancel();
        let token = LoadToken::new(tokens.next_generation);
        tokens.next_generation += 1;
        tokens.current = token.clone();
        token
    }

    /// Cancel whatever request currently owns the slot
    pub fn cancel_current(&self) {
        lock(&self.tokens).current.cancel();
    }

    /// Whether `token` belongs to the most recent request
    pub fn is_current(&self, token: &LoadToken) -> bool {
        lock(&self.tokens).current.generation() == token.generation()
    }

    /// Install a resource, handing back the one it replaces
    pub fn replace(&self, resource: R) -> Option<R> {
        lock(&self.resource).replace(resource)
    }

    pub fn take(&self) -> Option<R> {
        lock(&self.resource).take()
    }

    pub fn is_occupied(&self) -> bool {
        lock(&self.resource).is_some()
    }

    /// Inspect the applied resource without taking it
    pub fn inspect<T>(&self, f: impl FnOnce(Option<&R>) -> T) -> T {
        f(lock(&self.resource).as_ref())
    }
}

impl<R> Default for ResourceSlot<R> {
    fn default() -> Self {
        Self::new()
    }
}

// A panic while holding the lock cannot leave either field half-written.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
