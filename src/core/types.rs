// ============================================================================
// keywatch - Core Types
// Watcher identity, callback shapes and the per-key watcher record
// ============================================================================

use std::fmt;
use std::rc::Rc;

// =============================================================================
// WATCHER IDENTITY
// =============================================================================

/// Stable identifier of one watcher registration.
///
/// Ids are allocated per map, increase monotonically and are never reused,
/// so two registrations of the very same closure stay distinguishable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(pub(crate) u64);

impl WatcherId {
    /// The raw numeric value of this id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// CALLBACKS
// =============================================================================

/// Shared watcher callback, receiving `(new, old)`.
///
/// `None` stands for "no value": `new` is `None` when the key is deleted,
/// `old` is `None` when the key had no value before.
pub type WatchFn<V> = Rc<dyn Fn(Option<&V>, Option<&V>)>;

/// Wrap a closure as a [`WatchFn`].
///
/// Going through this bound lets the compiler infer the closure's argument
/// types.
pub fn watch_fn<V, F>(callback: F) -> WatchFn<V>
where
    F: Fn(Option<&V>, Option<&V>) + 'static,
{
    Rc::new(callback)
}

/// Equality function type for deciding whether a `set` is a change
pub type EqualsFn<V> = fn(&V, &V) -> bool;

// =============================================================================
// WATCHER RECORD
// =============================================================================

/// One registration in a key's watcher list.
///
/// Owned exclusively by the registry. Any invocation context is captured by
/// `callback` itself.
pub struct WatcherRecord<V> {
    pub(crate) id: WatcherId,
    pub(crate) callback: WatchFn<V>,
    pub(crate) once: bool,
}

impl<V> WatcherRecord<V> {
    pub(crate) fn new(id: WatcherId, callback: WatchFn<V>, once: bool) -> Self {
        Self { id, callback, once }
    }
}

impl<V> Clone for WatcherRecord<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: self.callback.clone(),
            once: self.once,
        }
    }
}

impl<V> fmt::Debug for WatcherRecord<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherRecord")
            .field("id", &self.id)
            .field("once", &self.once)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================
