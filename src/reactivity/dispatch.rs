// ============================================================================
// keywatch - Dispatch
// Delivering one change event to a key's watchers
// ============================================================================
//
// A pass works on a snapshot of the key's list. Before each callback the
// record is looked up again, so a watcher cancelled earlier in the same pass
// (by another callback, or reentrantly) is skipped, and a watcher added during
// the pass waits for the next event. No registry borrow is held while user
// code runs.
// ============================================================================

use std::borrow::Borrow;
use std::cell::RefCell;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{error, trace};

use crate::core::error::WatcherFailure;
use crate::core::options::PanicPolicy;
use crate::core::types::{WatchFn, WatcherId};
use crate::reactivity::registry::WatcherRegistry;

/// Fire every watcher registered on `key` with `(new, old)`.
///
/// One-shot watchers are retired before their callback runs. Returns the
/// callbacks that panicked (always empty under [`PanicPolicy::Propagate`],
/// where the first panic unwinds instead).
pub fn fire<K, V, Q>(
    registry: &RefCell<WatcherRegistry<K, V>>,
    key: &Q,
    new: Option<&V>,
    old: Option<&V>,
    policy: PanicPolicy,
) -> Vec<WatcherFailure>
where
    K: Eq + Hash + Clone + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
{
    let snapshot = registry.borrow().snapshot(key);
    if snapshot.is_empty() {
        return Vec::new();
    }

    trace!(
        watchers = snapshot.len(),
        deleted = new.is_none(),
        "dispatching change"
    );

    let mut failures = Vec::new();
    for record in snapshot {
        // Cancelled earlier in this pass
        if !registry.borrow().contains(record.id) {
            continue;
        }

        if record.once {
            registry.borrow_mut().remove(record.id);
            trace!(watcher = record.id.as_u64(), "one-shot watcher retired");
        }

        if let Some(failure) = invoke(record.id, &record.callback, new, old, policy) {
            failures.push(failure);
        }
    }
    failures
}

/// Run a single callback under the given panic policy.
pub fn invoke<V>(
    id: WatcherId,
    callback: &WatchFn<V>,
    new: Option<&V>,
    old: Option<&V>,
    policy: PanicPolicy,
) -> Option<WatcherFailure> {
    match policy {
        PanicPolicy::Propagate => {
            callback(new, old);
            None
        }
        PanicPolicy::Isolate => {
            let result = catch_unwind(AssertUnwindSafe(|| callback(new, old)));
            match result {
                Ok(()) => None,
                Err(payload) => {
                    let failure = WatcherFailure::from_panic(id, payload.as_ref());
                    error!(
                        watcher = id.as_u64(),
                        message = %failure.message,
                        "watcher panicked; continuing with remaining watchers"
                    );
                    Some(failure)
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::watch_fn;
    use std::cell::Cell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(Option<i32>, Option<i32>)>>>;

    fn recorder(log: &Log) -> WatchFn<i32> {
        let log = log.clone();
        watch_fn(move |new, old| log.borrow_mut().push((new.copied(), old.copied())))
    }

    #[test]
    fn fires_in_registration_order() {
        let reg = RefCell::new(WatcherRegistry::<&str, i32>::new());
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            reg.borrow_mut()
                .insert("k", watch_fn(move |_, _| order.borrow_mut().push(n)), false);
        }

        let failures = fire(&reg, "k", Some(&1), None, PanicPolicy::Isolate);
        assert!(failures.is_empty());
        assert_eq!(*(*order).borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn passes_new_and_old() {
        let reg = RefCell::new(WatcherRegistry::<&str, i32>::new());
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        reg.borrow_mut().insert("k", recorder(&log), false);

        fire(&reg, "k", Some(&2), Some(&1), PanicPolicy::Isolate);
        fire(&reg, "k", None, Some(&2), PanicPolicy::Isolate);

        assert_eq!(*(*log).borrow(), vec![(Some(2), Some(1)), (None, Some(2))]);
    }

    #[test]
    fn other_keys_are_untouched() {
        let reg = RefCell::new(WatcherRegistry::<&str, i32>::new());
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        reg.borrow_mut().insert("a", recorder(&log), false);

        fire(&reg, "b", Some(&1), None, PanicPolicy::Isolate);
        assert!((*log).borrow().is_empty());
    }

    #[test]
    fn once_records_are_retired_before_running() {
        let reg = Rc::new(RefCell::new(WatcherRegistry::<&str, i32>::new()));
        let seen_registered = Rc::new(Cell::new(true));

        let reg_clone = reg.clone();
        let seen = seen_registered.clone();
        let id_cell = Rc::new(Cell::new(None::<WatcherId>));
        let id_inner = id_cell.clone();
        let id = reg.borrow_mut().insert(
            "k",
            watch_fn(move |_, _| {
                let id = id_inner.get().unwrap();
                seen.set((*reg_clone).borrow().contains(id));
            }),
            true,
        );
        id_cell.set(Some(id));

        fire(&*reg, "k", Some(&1), None, PanicPolicy::Isolate);
        assert!(!seen_registered.get());
        assert_eq!((*reg).borrow().count("k"), 0);
    }

    #[test]
    fn cancellation_mid_pass_skips_later_watcher() {
        let reg = Rc::new(RefCell::new(WatcherRegistry::<&str, i32>::new()));
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let victim = Rc::new(Cell::new(None::<WatcherId>));

        let reg_clone = reg.clone();
        let victim_clone = victim.clone();
        reg.borrow_mut().insert(
            "k",
            watch_fn(move |_, _| {
                if let Some(id) = victim_clone.get() {
                    reg_clone.borrow_mut().remove(id);
                }
            }),
            false,
        );
        let doomed = reg.borrow_mut().insert("k", recorder(&log), false);
        let survivor_log: Log = Rc::new(RefCell::new(Vec::new()));
        reg.borrow_mut().insert("k", recorder(&survivor_log), false);
        victim.set(Some(doomed));

        fire(&*reg, "k", Some(&1), None, PanicPolicy::Isolate);

        assert!((*log).borrow().is_empty());
        assert_eq!(*(*survivor_log).borrow(), vec![(Some(1), None)]);
    }

    #[test]
    fn isolated_panic_does_not_stop_delivery() {
        let reg = RefCell::new(WatcherRegistry::<&str, i32>::new());
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let bad = reg
            .borrow_mut()
            .insert("k", watch_fn(|_, _| panic!("watcher exploded")), false);
        reg.borrow_mut().insert("k", recorder(&log), false);

        let failures = fire(&reg, "k", Some(&1), None, PanicPolicy::Isolate);

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, bad);
        assert_eq!(failures[0].message, "watcher exploded");
        assert_eq!((*log).borrow().len(), 1);
    }

    #[test]
    #[should_panic(expected = "straight through")]
    fn propagate_policy_unwinds() {
        let reg = RefCell::new(WatcherRegistry::<&str, i32>::new());
        reg.borrow_mut()
            .insert("k", watch_fn(|_, _| panic!("straight through")), false);
        fire(&reg, "k", Some(&1), None, PanicPolicy::Propagate);
    }
}
