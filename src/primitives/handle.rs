// ============================================================================
// keywatch - Watch Handle
// The cancellation token returned by every watcher registration
// ============================================================================

use std::fmt;
use std::rc::Weak;

use crate::core::types::WatcherId;
use crate::reactivity::registry::WatcherSlot;

/// Revokes one specific watcher registration.
///
/// Returned by `watch`, `once` and their variants. Cancellation is by id, so
/// registering the same closure twice yields two independently cancellable
/// watchers.
///
/// Dropping a handle does **not** cancel the watcher; call [`cancel`] for
/// that. The handle only holds a weak reference, so it never keeps a map
/// alive and turns into a no-op once the map is gone.
///
/// # Example
///
/// ```
/// use keywatch::ObservableMap;
///
/// let map: ObservableMap<&str, i32> = ObservableMap::new();
/// let handle = map.watch("x", |_, _| {});
/// assert_eq!(map.count_watchers("x"), 1);
///
/// assert!(handle.cancel());
/// assert!(!handle.cancel());
/// assert_eq!(map.count_watchers("x"), 0);
/// ```
///
/// [`cancel`]: WatchHandle::cancel
#[derive(Clone)]
pub struct WatchHandle {
    id: WatcherId,
    slot: Option<Weak<dyn WatcherSlot>>,
}

impl WatchHandle {
    pub(crate) fn new(id: WatcherId, slot: Weak<dyn WatcherSlot>) -> Self {
        Self { id, slot: Some(slot) }
    }

    /// A handle for a watcher that was never installed (a one-shot watcher
    /// that already fired during registration).
    pub(crate) fn detached(id: WatcherId) -> Self {
        Self { id, slot: None }
    }

    /// The id of the watcher this handle controls.
    pub fn id(&self) -> WatcherId {
        self.id
    }

    /// Remove the watcher. Returns true if it was still active.
    ///
    /// Safe to call from inside any watcher callback, including the
    /// watcher's own; the change takes effect for the very next callback
    /// of the current dispatch pass.
    pub fn cancel(&self) -> bool {
        match self.slot.as_ref().and_then(Weak::upgrade) {
            Some(slot) => slot.retire(self.id),
            None => false,
        }
    }

    /// Whether the watcher is still registered.
    pub fn is_active(&self) -> bool {
        match self.slot.as_ref().and_then(Weak::upgrade) {
            Some(slot) => slot.is_registered(self.id),
            None => false,
        }
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
