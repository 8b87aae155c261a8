// ============================================================================
// keywatch - Errors
// Reporting of watcher callbacks that panicked during a dispatch pass
// ============================================================================

use std::any::Any;
use std::fmt;

use crate::core::types::WatcherId;

/// A single watcher callback that panicked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatcherFailure {
    /// The watcher whose callback panicked.
    pub id: WatcherId,
    /// The panic message, when the payload was a string.
    pub message: String,
}

impl WatcherFailure {
    pub(crate) fn from_panic(id: WatcherId, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { id, message }
    }
}

impl fmt::Display for WatcherFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watcher {} panicked: {}", self.id, self.message)
    }
}

/// Returned by the `try_*` operations when one or more watchers panicked.
///
/// The operation itself ran to completion: every other watcher was invoked
/// and the store was updated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchError {
    failures: Vec<WatcherFailure>,
}

impl DispatchError {
    pub(crate) fn new(failures: Vec<WatcherFailure>) -> Self {
        Self { failures }
    }

    /// Every watcher that panicked, in firing order.
    pub fn failures(&self) -> &[WatcherFailure] {
        &self.failures
    }

    /// Number of watchers that panicked.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Always false for errors produced by the map.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failures.as_slice() {
            [single] => write!(f, "{}", single),
            [first, rest @ ..] => {
                write!(f, "{} (and {} more)", first, rest.len())
            }
            [] => write!(f, "no watcher failures"),
        }
    }
}

impl std::error::Error for DispatchError {}
