// Model-based checks: a random sequence of operations is applied to an
// ObservableMap and to a plain HashMap model, and the watcher events are
// compared with what the model predicts.

use keywatch::{ObservableMap, WatchHandle};
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const KEYS: [&str; 3] = ["a", "b", "c"];

#[derive(Clone, Debug)]
enum Op {
    Set(usize, i8),
    Delete(usize),
    Watch(usize),
    Once(usize),
    Cancel(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..KEYS.len(), -3i8..3).prop_map(|(k, v)| Op::Set(k, v)),
        2 => (0..KEYS.len()).prop_map(Op::Delete),
        2 => (0..KEYS.len()).prop_map(Op::Watch),
        1 => (0..KEYS.len()).prop_map(Op::Once),
        1 => (0..16usize).prop_map(Op::Cancel),
    ]
}

type Event = (usize, Option<i8>, Option<i8>);

struct ModelWatcher {
    key: usize,
    once: bool,
    active: bool,
}

proptest! {
    #[test]
    fn events_match_model(ops in prop::collection::vec(op(), 1..60)) {
        let map: ObservableMap<&str, i8> = ObservableMap::new();
        let log: Rc<RefCell<Vec<Event>>> = Rc::new(RefCell::new(Vec::new()));
        let mut handles: Vec<WatchHandle> = Vec::new();

        let mut model: HashMap<usize, i8> = HashMap::new();
        let mut watchers: Vec<ModelWatcher> = Vec::new();
        let mut expected: Vec<Event> = Vec::new();

        for op in ops {
            match op {
                Op::Set(k, v) => {
                    let old = model.get(&k).copied();
                    if old != Some(v) {
                        for (i, w) in watchers.iter_mut().enumerate() {
                            if w.active && w.key == k {
                                expected.push((i, Some(v), old));
                                if w.once {
                                    w.active = false;
                                }
                            }
                        }
                        model.insert(k, v);
                    }
                    map.set(KEYS[k], v);
                }
                Op::Delete(k) => {
                    let existed = model.remove(&k);
                    if let Some(old) = existed {
                        for (i, w) in watchers.iter_mut().enumerate() {
                            if w.active && w.key == k {
                                expected.push((i, None, Some(old)));
                                if w.once {
                                    w.active = false;
                                }
                            }
                        }
                    }
                    prop_assert_eq!(map.delete(KEYS[k]), existed.is_some());
                }
                Op::Watch(k) | Op::Once(k) => {
                    let once = matches!(op, Op::Once(_));
                    let index = watchers.len();
                    let log = log.clone();
                    let callback = move |new: Option<&i8>, old: Option<&i8>| {
                        log.borrow_mut().push((index, new.copied(), old.copied()));
                    };
                    let handle = if once {
                        map.once(KEYS[k], callback)
                    } else {
                        map.watch(KEYS[k], callback)
                    };
                    handles.push(handle);
                    watchers.push(ModelWatcher { key: k, once, active: true });
                }
                Op::Cancel(i) => {
                    if let Some(handle) = handles.get(i) {
                        let was_active = watchers[i].active;
                        prop_assert_eq!(handle.cancel(), was_active);
                        watchers[i].active = false;
                    }
                }
            }

            for (k, key) in KEYS.iter().enumerate() {
                let active = watchers.iter().filter(|w| w.active && w.key == k).count();
                prop_assert_eq!(map.count_watchers(*key), active);
                prop_assert_eq!(map.get(*key), model.get(&k).copied());
            }
        }

        prop_assert_eq!(&*log.borrow(), &expected);
    }

    #[test]
    fn previous_tracks_last_distinct_value(values in prop::collection::vec(0u8..4, 1..30)) {
        let map: ObservableMap<&str, u8> = ObservableMap::new();
        let mut current: Option<u8> = None;
        let mut previous: Option<u8> = None;

        for v in values {
            if current != Some(v) {
                previous = current;
                current = Some(v);
            }
            map.set("k", v);
            prop_assert_eq!(map.previous("k"), previous);
        }
    }
}
