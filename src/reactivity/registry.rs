// ============================================================================
// keywatch - Watcher Registry
// Per-key ordered watcher lists with id-based removal
// ============================================================================

use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

use tracing::trace;

use crate::core::types::{WatchFn, WatcherId, WatcherRecord};

// =============================================================================
// WATCHER REGISTRY
// =============================================================================

/// Per-key watcher lists, each kept in registration order.
///
/// Records are indexed by id as well, so a cancellation handle only needs to
/// carry the id. A key whose list runs empty loses its entry.
pub struct WatcherRegistry<K, V> {
    /// Watchers per key, registration order
    lists: HashMap<K, Vec<WatcherRecord<V>>>,

    /// Owning key of every live watcher
    owners: HashMap<WatcherId, K>,

    /// Next id to hand out; never reused
    next_id: u64,
}

impl<K, V> WatcherRegistry<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            lists: HashMap::new(),
            owners: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate a fresh watcher id.
    pub fn allocate_id(&mut self) -> WatcherId {
        let id = WatcherId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a callback at the end of `key`'s list, returning its id.
    pub fn insert(&mut self, key: K, callback: WatchFn<V>, once: bool) -> WatcherId {
        let id = self.allocate_id();
        self.owners.insert(id, key.clone());
        self.lists
            .entry(key)
            .or_default()
            .push(WatcherRecord::new(id, callback, once));
        id
    }

    /// Remove a watcher by id. Returns false if it was not registered.
    pub fn remove(&mut self, id: WatcherId) -> bool {
        let Some(key) = self.owners.remove(&id) else {
            return false;
        };

        if let Some(list) = self.lists.get_mut(&key) {
            list.retain(|record| record.id != id);
            if list.is_empty() {
                self.lists.remove(&key);
            }
        }
        true
    }

    /// Remove every watcher on `key`, returning how many there were.
    pub fn remove_key<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.lists.remove(key) {
            Some(list) => {
                for record in &list {
                    self.owners.remove(&record.id);
                }
                list.len()
            }
            None => 0,
        }
    }

    /// Whether the watcher is still registered.
    pub fn contains(&self, id: WatcherId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Number of active watchers on `key` (zero for unknown keys).
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lists.get(key).map_or(0, Vec::len)
    }

    /// Copy of `key`'s list as it is right now.
    ///
    /// Dispatch iterates this copy so that callbacks may add or cancel
    /// watchers without disturbing the pass.
    pub fn snapshot<Q>(&self, key: &Q) -> Vec<WatcherRecord<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lists.get(key).cloned().unwrap_or_default()
    }

    /// Keys with at least one watcher.
    pub fn keys(&self) -> Vec<K> {
        self.lists.keys().cloned().collect()
    }

    /// Total number of watchers across all keys.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// True if no watcher is registered anywhere.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl<K, V> Default for WatcherRegistry<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TYPE-ERASED ACCESS (for handles)
// =============================================================================

/// Type-erased view of a registry, so `WatchHandle` does not carry the map's
/// key and value types.
pub trait WatcherSlot {
    /// Remove the watcher. Returns true if it was still registered.
    fn retire(&self, id: WatcherId) -> bool;

    /// Whether the watcher is still registered.
    fn is_registered(&self, id: WatcherId) -> bool;
}

impl<K, V> WatcherSlot for RefCell<WatcherRegistry<K, V>>
where
    K: Eq + Hash + Clone,
{
    fn retire(&self, id: WatcherId) -> bool {
        let removed = self.borrow_mut().remove(id);
        if removed {
            trace!(watcher = id.as_u64(), "watcher cancelled");
        }
        removed
    }

    fn is_registered(&self, id: WatcherId) -> bool {
        self.borrow().contains(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
