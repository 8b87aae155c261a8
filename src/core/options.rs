// ============================================================================
// keywatch - Options
// Configuration for maps and individual watcher registrations
// ============================================================================

use crate::core::types::EqualsFn;
use crate::reactivity::equality::equals;

// =============================================================================
// WATCH OPTIONS
// =============================================================================

/// Options for a single `watch`/`once` registration.
///
/// # Example
///
/// ```
/// use keywatch::{ObservableMap, WatchOptions};
///
/// let map = ObservableMap::new();
/// map.set("theme", "dark");
///
/// // Fires right away because "theme" is already set
/// let _handle = map.watch_with("theme", WatchOptions::always(), |new, _old| {
///     assert_eq!(new, Some(&"dark"));
/// });
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Invoke the callback immediately at registration when the key
    /// already holds a value.
    pub always: bool,
}

impl WatchOptions {
    /// Options with every flag off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with `always` set.
    pub fn always() -> Self {
        Self { always: true }
    }

    /// Set the `always` flag.
    pub fn with_always(mut self, always: bool) -> Self {
        self.always = always;
        self
    }
}

// =============================================================================
// MAP OPTIONS
// =============================================================================

/// What happens when a watcher callback panics during a dispatch pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Catch the panic, keep delivering to the remaining watchers, finish the
    /// operation, then report the failure.
    #[default]
    Isolate,
    /// Let the first panic unwind straight through the operation.
    Propagate,
}

/// Configuration for an [`ObservableMap`](crate::ObservableMap).
pub struct MapOptions<V> {
    /// Decides whether a `set` is a change. Defaults to `PartialEq`.
    pub equals: EqualsFn<V>,

    /// Watcher panic handling. Defaults to [`PanicPolicy::Isolate`].
    pub panic_policy: PanicPolicy,

    /// Initial capacity of the value store.
    pub capacity: usize,
}

impl<V: PartialEq> Default for MapOptions<V> {
    fn default() -> Self {
        Self {
            equals,
            panic_policy: PanicPolicy::default(),
            capacity: 0,
        }
    }
}

impl<V> MapOptions<V> {
    /// Options using a custom equality function and otherwise defaults.
    ///
    /// Works for value types without `PartialEq`.
    pub fn with_equals(equals: EqualsFn<V>) -> Self {
        Self {
            equals,
            panic_policy: PanicPolicy::default(),
            capacity: 0,
        }
    }

    /// Replace the equality function.
    pub fn equals(mut self, equals: EqualsFn<V>) -> Self {
        self.equals = equals;
        self
    }

    /// Replace the panic policy.
    pub fn panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.panic_policy = policy;
        self
    }

    /// Reserve room for `capacity` entries up front.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl<V> Clone for MapOptions<V> {
    fn clone(&self) -> Self {
        Self {
            equals: self.equals,
            panic_policy: self.panic_policy,
            capacity: self.capacity,
        }
    }
}

impl<V> std::fmt::Debug for MapOptions<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapOptions")
            .field("panic_policy", &self.panic_policy)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
