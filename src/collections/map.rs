// ============================================================================
// keywatch - ObservableMap
// A HashMap whose keys can be watched for changes
// ============================================================================

use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::core::error::{DispatchError, WatcherFailure};
use crate::core::options::{MapOptions, PanicPolicy, WatchOptions};
use crate::core::types::{watch_fn, EqualsFn, WatchFn, WatcherId};
use crate::primitives::handle::WatchHandle;
use crate::reactivity::dispatch::{fire, invoke};
use crate::reactivity::registry::{WatcherRegistry, WatcherSlot};

// =============================================================================
// SHARED STATE
// =============================================================================

struct MapInner<K, V> {
    /// Current values
    data: RefCell<HashMap<K, V>>,

    /// Value each key held before its latest change
    previous: RefCell<HashMap<K, V>>,

    /// Per-key watchers; handles keep weak references to this
    watchers: Rc<RefCell<WatcherRegistry<K, V>>>,

    equals: EqualsFn<V>,
    panic_policy: PanicPolicy,
}

/// Result of applying one `set`/`delete` to the store.
struct Applied {
    changed: bool,
    failures: Vec<WatcherFailure>,
}

// =============================================================================
// OBSERVABLE MAP
// =============================================================================

/// A HashMap with per-key change watchers.
///
/// Watchers registered on a key are called with `(new, old)` every time that
/// key's value changes through [`set`](Self::set) or is removed through
/// [`delete`](Self::delete). Setting a key to a value equal to its current
/// one is not a change (see [`MapOptions::equals`]).
///
/// Watchers run synchronously, in registration order, **before** the new
/// value is stored: a callback that reads the map sees the old state.
///
/// `ObservableMap` is a handle. Clones share the same entries and watchers,
/// which is how a callback can call back into its own map.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use keywatch::ObservableMap;
///
/// let map = ObservableMap::new();
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let log = seen.clone();
/// let _handle = map.watch("x", move |new: Option<&i32>, old: Option<&i32>| {
///     log.borrow_mut().push((new.copied(), old.copied()));
/// });
///
/// map.set("x", 5).set("x", 4).set("x", 4).set("x", 3);
///
/// assert_eq!(
///     *seen.borrow(),
///     vec![(Some(5), None), (Some(4), Some(5)), (Some(3), Some(4))]
/// );
/// ```
pub struct ObservableMap<K, V> {
    inner: Rc<MapInner<K, V>>,
}

/// A non-owning reference to an [`ObservableMap`].
///
/// Callbacks that need their own map should capture one of these rather than
/// a clone, so the map does not keep itself alive through its watchers.
pub struct WeakObservableMap<K, V> {
    inner: Weak<MapInner<K, V>>,
}

impl<K, V> ObservableMap<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    /// Create an empty map using `PartialEq` to detect changes.
    pub fn new() -> Self
    where
        V: PartialEq,
    {
        Self::with_options(MapOptions::default())
    }

    /// Create an empty map with explicit options.
    pub fn with_options(options: MapOptions<V>) -> Self {
        Self {
            inner: Rc::new(MapInner {
                data: RefCell::new(HashMap::with_capacity(options.capacity)),
                previous: RefCell::new(HashMap::new()),
                watchers: Rc::new(RefCell::new(WatcherRegistry::new())),
                equals: options.equals,
                panic_policy: options.panic_policy,
            }),
        }
    }

    /// Create a map seeded with `entries`. Nothing fires during seeding.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        V: PartialEq,
    {
        Self::from_entries_with_options(entries, MapOptions::default())
    }

    /// Create a seeded map with explicit options.
    pub fn from_entries_with_options<I>(entries: I, options: MapOptions<V>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let map = Self::with_options(options);
        map.inner.data.borrow_mut().extend(entries);
        map
    }

    /// Create a weak reference to this map.
    pub fn downgrade(&self) -> WeakObservableMap<K, V> {
        WeakObservableMap {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// True if both handles point at the same map.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    // =========================================================================
    // SET
    // =========================================================================

    /// Store `value` under `key`, notifying the key's watchers if it changed.
    ///
    /// Returns `&self` for chaining.
    ///
    /// # Panics
    ///
    /// If a watcher panicked. Under the default [`PanicPolicy::Isolate`] the
    /// panic is raised only after every other watcher ran and the value was
    /// stored; use [`try_set`](Self::try_set) to get the failures as an error
    /// instead.
    pub fn set(&self, key: K, value: V) -> &Self {
        if let Err(err) = self.try_set(key, value) {
            panic!("{}", err);
        }
        self
    }

    /// Like [`set`](Self::set), but reports watcher panics as an error.
    ///
    /// On `Err` the operation has still completed.
    pub fn try_set(&self, key: K, value: V) -> Result<&Self, DispatchError> {
        let applied = self.apply_set(key, value);
        report(applied.failures)?;
        Ok(self)
    }

    fn apply_set(&self, key: K, value: V) -> Applied {
        let old = self.inner.data.borrow().get(&key).cloned();

        if let Some(current) = &old {
            if (self.inner.equals)(current, &value) {
                return Applied {
                    changed: false,
                    failures: Vec::new(),
                };
            }
        }

        {
            let mut previous = self.inner.previous.borrow_mut();
            match &old {
                Some(old) => previous.insert(key.clone(), old.clone()),
                None => previous.remove(&key),
            };
        }

        let failures = fire(
            &*self.inner.watchers,
            &key,
            Some(&value),
            old.as_ref(),
            self.inner.panic_policy,
        );

        self.inner.data.borrow_mut().insert(key, value);

        Applied {
            changed: true,
            failures,
        }
    }

    // =========================================================================
    // DELETE
    // =========================================================================

    /// Remove `key`, notifying its watchers with `(None, Some(last))`.
    ///
    /// Returns true if the key existed. Deleting an absent key notifies
    /// nobody.
    ///
    /// # Panics
    ///
    /// If a watcher panicked, after the removal completed. See
    /// [`try_delete`](Self::try_delete).
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.try_delete(key) {
            Ok(existed) => existed,
            Err(err) => panic!("{}", err),
        }
    }

    /// Like [`delete`](Self::delete), but reports watcher panics as an error.
    pub fn try_delete<Q>(&self, key: &Q) -> Result<bool, DispatchError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let applied = self.apply_delete(key);
        report(applied.failures)?;
        Ok(applied.changed)
    }

    fn apply_delete<Q>(&self, key: &Q) -> Applied
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(old) = self.inner.data.borrow().get(key).cloned() else {
            return Applied {
                changed: false,
                failures: Vec::new(),
            };
        };

        let failures = fire(
            &*self.inner.watchers,
            key,
            None,
            Some(&old),
            self.inner.panic_policy,
        );

        self.inner.previous.borrow_mut().remove(key);
        self.inner.data.borrow_mut().remove(key);

        Applied {
            changed: true,
            failures,
        }
    }

    // =========================================================================
    // UPDATE / CLEAR
    // =========================================================================

    /// Compute the next state of `key` from its current value.
    ///
    /// `Some(v)` behaves as [`set`](Self::set), `None` as
    /// [`delete`](Self::delete). Returns true if watchers were notified.
    ///
    /// # Example
    ///
    /// ```
    /// use keywatch::ObservableMap;
    ///
    /// let map: ObservableMap<&str, u32> = ObservableMap::new();
    /// map.update("hits", |n| Some(n.copied().unwrap_or(0) + 1));
    /// map.update("hits", |n| Some(n.copied().unwrap_or(0) + 1));
    /// assert_eq!(map.get("hits"), Some(2));
    ///
    /// map.update("hits", |_| None);
    /// assert!(!map.contains_key("hits"));
    /// ```
    pub fn update<F>(&self, key: K, f: F) -> bool
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        match self.try_update(key, f) {
            Ok(changed) => changed,
            Err(err) => panic!("{}", err),
        }
    }

    /// Like [`update`](Self::update), but reports watcher panics as an error.
    pub fn try_update<F>(&self, key: K, f: F) -> Result<bool, DispatchError>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let current = self.inner.data.borrow().get(&key).cloned();
        let applied = match f(current.as_ref()) {
            Some(next) => self.apply_set(key, next),
            None => self.apply_delete(&key),
        };
        report(applied.failures)?;
        Ok(applied.changed)
    }

    /// Delete every key, notifying each key's watchers as
    /// [`delete`](Self::delete) does. Watchers stay registered.
    pub fn clear(&self) {
        if let Err(err) = self.try_clear() {
            panic!("{}", err);
        }
    }

    /// Like [`clear`](Self::clear), returning how many keys were removed.
    pub fn try_clear(&self) -> Result<usize, DispatchError> {
        let keys: Vec<K> = self.inner.data.borrow().keys().cloned().collect();

        let mut removed = 0;
        let mut failures = Vec::new();
        for key in keys {
            let applied = self.apply_delete(&key);
            if applied.changed {
                removed += 1;
            }
            failures.extend(applied.failures);
        }

        debug!(removed, "map cleared");
        report(failures)?;
        Ok(removed)
    }

    // =========================================================================
    // WATCH / ONCE
    // =========================================================================

    /// Watch `key` for changes until the returned handle is cancelled.
    pub fn watch<F>(&self, key: K, callback: F) -> WatchHandle
    where
        F: Fn(Option<&V>, Option<&V>) + 'static,
    {
        self.register(key, WatchOptions::default(), watch_fn(callback), false)
    }

    /// Watch `key` with options.
    ///
    /// With `always`, a key that already holds a value triggers one immediate
    /// call with `(current, previous)`, in addition to later changes.
    pub fn watch_with<F>(&self, key: K, options: WatchOptions, callback: F) -> WatchHandle
    where
        F: Fn(Option<&V>, Option<&V>) + 'static,
    {
        self.register(key, options, watch_fn(callback), false)
    }

    /// Watch `key` with a callback bound to `context`.
    ///
    /// The context is passed to every invocation and lives as long as the
    /// watcher does.
    ///
    /// # Example
    ///
    /// ```
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    /// use keywatch::{ObservableMap, WatchOptions};
    ///
    /// struct Counter { hits: Cell<u32> }
    ///
    /// let map: ObservableMap<&str, bool> = ObservableMap::new();
    /// let counter = Rc::new(Counter { hits: Cell::new(0) });
    ///
    /// let _h = map.watch_bound("flag", counter.clone(), WatchOptions::new(), |c, _, _| {
    ///     c.hits.set(c.hits.get() + 1);
    /// });
    ///
    /// map.set("flag", true).set("flag", false);
    /// assert_eq!(counter.hits.get(), 2);
    /// ```
    pub fn watch_bound<C, F>(
        &self,
        key: K,
        context: Rc<C>,
        options: WatchOptions,
        callback: F,
    ) -> WatchHandle
    where
        C: 'static,
        F: Fn(&C, Option<&V>, Option<&V>) + 'static,
    {
        let bound = watch_fn(move |new, old| callback(&context, new, old));
        self.register(key, options, bound, false)
    }

    /// Watch `key` for its next change only.
    pub fn once<F>(&self, key: K, callback: F) -> WatchHandle
    where
        F: Fn(Option<&V>, Option<&V>) + 'static,
    {
        self.register(key, WatchOptions::default(), watch_fn(callback), true)
    }

    /// One-shot watch with options.
    ///
    /// With `always` and a key that already holds a value, the immediate
    /// call is the only call: the watcher is never installed and the
    /// returned handle is already inactive.
    pub fn once_with<F>(&self, key: K, options: WatchOptions, callback: F) -> WatchHandle
    where
        F: Fn(Option<&V>, Option<&V>) + 'static,
    {
        self.register(key, options, watch_fn(callback), true)
    }

    /// One-shot watch with a callback bound to `context`.
    pub fn once_bound<C, F>(
        &self,
        key: K,
        context: Rc<C>,
        options: WatchOptions,
        callback: F,
    ) -> WatchHandle
    where
        C: 'static,
        F: Fn(&C, Option<&V>, Option<&V>) + 'static,
    {
        let bound = watch_fn(move |new, old| callback(&context, new, old));
        self.register(key, options, bound, true)
    }

    /// Like [`watch_with`](Self::watch_with), but reports a panic in the
    /// `always` immediate call as an error.
    ///
    /// A watcher whose immediate call failed is not left registered.
    ///
    /// # Example
    ///
    /// ```
    /// use keywatch::{ObservableMap, WatchOptions};
    ///
    /// let map = ObservableMap::new();
    /// map.set("k", 1);
    ///
    /// let err = map
    ///     .try_watch_with("k", WatchOptions::always(), |_: Option<&i32>, _: Option<&i32>| {
    ///         panic!("boom")
    ///     })
    ///     .unwrap_err();
    /// assert_eq!(err.failures()[0].message, "boom");
    /// assert_eq!(map.count_watchers("k"), 0);
    /// ```
    pub fn try_watch_with<F>(
        &self,
        key: K,
        options: WatchOptions,
        callback: F,
    ) -> Result<WatchHandle, DispatchError>
    where
        F: Fn(Option<&V>, Option<&V>) + 'static,
    {
        self.try_register(key, options, watch_fn(callback), false)
    }

    /// Like [`once_with`](Self::once_with), but reports a panic in the
    /// `always` immediate call as an error.
    pub fn try_once_with<F>(
        &self,
        key: K,
        options: WatchOptions,
        callback: F,
    ) -> Result<WatchHandle, DispatchError>
    where
        F: Fn(Option<&V>, Option<&V>) + 'static,
    {
        self.try_register(key, options, watch_fn(callback), true)
    }

    fn register(&self, key: K, options: WatchOptions, callback: WatchFn<V>, once: bool) -> WatchHandle {
        match self.try_register(key, options, callback, once) {
            Ok(handle) => handle,
            Err(err) => panic!("{}", err),
        }
    }

    fn try_register(
        &self,
        key: K,
        options: WatchOptions,
        callback: WatchFn<V>,
        once: bool,
    ) -> Result<WatchHandle, DispatchError> {
        let immediate = if options.always {
            self.inner.data.borrow().get(&key).cloned()
        } else {
            None
        };

        let Some(current) = immediate else {
            let handle = self.install(key, callback, once);
            trace!(watcher = handle.id().as_u64(), once, "watcher registered");
            return Ok(handle);
        };

        let previous = self.inner.previous.borrow().get(&key).cloned();

        let handle = if once {
            let id = self.inner.watchers.borrow_mut().allocate_id();
            trace!(watcher = id.as_u64(), "one-shot watcher fired at registration");
            WatchHandle::detached(id)
        } else {
            let handle = self.install(key, callback.clone(), false);
            trace!(watcher = handle.id().as_u64(), "watcher registered, firing immediately");
            handle
        };

        // Under `Propagate` the call unwinds; retire the record on the way out.
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            invoke(
                handle.id(),
                &callback,
                Some(&current),
                previous.as_ref(),
                self.inner.panic_policy,
            )
        }));

        match outcome {
            Ok(None) => Ok(handle),
            Ok(Some(failure)) => {
                handle.cancel();
                Err(DispatchError::new(vec![failure]))
            }
            Err(payload) => {
                handle.cancel();
                resume_unwind(payload)
            }
        }
    }

    fn install(&self, key: K, callback: WatchFn<V>, once: bool) -> WatchHandle {
        let id: WatcherId = self.inner.watchers.borrow_mut().insert(key, callback, once);
        let slot: Rc<dyn WatcherSlot> = self.inner.watchers.clone();
        WatchHandle::new(id, Rc::downgrade(&slot))
    }

    // =========================================================================
    // WATCHER BOOKKEEPING
    // =========================================================================

    /// Number of active watchers on `key`; zero for unknown keys.
    pub fn count_watchers<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        (*self.inner.watchers).borrow().count(key)
    }

    /// Cancel every watcher on `key`, returning how many were removed.
    pub fn cancel_all<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.inner.watchers.borrow_mut().remove_key(key);
        if removed > 0 {
            debug!(removed, "watchers cancelled for key");
        }
        removed
    }

    /// Keys that currently have at least one watcher.
    pub fn watched_keys(&self) -> Vec<K> {
        (*self.inner.watchers).borrow().keys()
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// A clone of the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.data.borrow().get(key).cloned()
    }

    /// Access the value under `key` without cloning.
    ///
    /// The map is borrowed while `f` runs; `f` must not modify the map.
    pub fn with<Q, R>(&self, key: &Q, f: impl FnOnce(Option<&V>) -> R) -> R
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        f(self.inner.data.borrow().get(key))
    }

    /// The value `key` held before its latest change, if any.
    ///
    /// Cleared when the key is deleted.
    pub fn previous<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.previous.borrow().get(key).cloned()
    }

    /// Returns true if the map contains a value for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.data.borrow().contains_key(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.data.borrow().len()
    }

    /// Returns true if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.data.borrow().is_empty()
    }

    /// Snapshot of the keys, in arbitrary order.
    pub fn keys(&self) -> Vec<K> {
        self.inner.data.borrow().keys().cloned().collect()
    }

    /// Snapshot of the values, in arbitrary order.
    pub fn values(&self) -> Vec<V> {
        self.inner.data.borrow().values().cloned().collect()
    }

    /// Snapshot of the entries, in arbitrary order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.inner
            .data
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Visit each entry. The map is borrowed during the walk; `f` must not
    /// modify it.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for (k, v) in self.inner.data.borrow().iter() {
            f(k, v);
        }
    }

    /// Copy the entries into a plain HashMap.
    pub fn to_hash_map(&self) -> HashMap<K, V> {
        self.inner.data.borrow().clone()
    }
}

fn report(failures: Vec<WatcherFailure>) -> Result<(), DispatchError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(DispatchError::new(failures))
    }
}

// =============================================================================
// WEAK HANDLE
// =============================================================================

impl<K, V> WeakObservableMap<K, V> {
    /// Get the map back, if it is still alive.
    pub fn upgrade(&self) -> Option<ObservableMap<K, V>> {
        self.inner.upgrade().map(|inner| ObservableMap { inner })
    }
}

impl<K, V> Clone for WeakObservableMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

// =============================================================================
// TRAIT IMPLS
// =============================================================================

impl<K, V> Clone for ObservableMap<K, V> {
    /// Another handle to the same map (entries and watchers are shared).
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Default for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}

impl<K, V> fmt::Debug for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableMap")
            .field("data", &self.inner.data.borrow())
            .field("watchers", &(*self.inner.watchers).borrow().len())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
