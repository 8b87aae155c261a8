use keywatch::{cloned, ObservableMap};
use std::cell::Cell;
use std::rc::Rc;

/// Flags when dropped, to observe when a callback's captures are released.
struct DropFlag(Rc<Cell<bool>>);

impl DropFlag {
    fn touch(&self) {}
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

#[test]
fn cancel_releases_callback_captures() {
    let dropped = Rc::new(Cell::new(false));
    let map: ObservableMap<&str, i32> = ObservableMap::new();

    let flag = DropFlag(dropped.clone());
    let handle = map.watch("k", move |_, _| {
        flag.touch();
    });

    assert!(!dropped.get());
    handle.cancel();
    assert!(dropped.get(), "Cancelled watcher should drop its closure");
}

#[test]
fn once_releases_captures_after_firing() {
    let dropped = Rc::new(Cell::new(false));
    let map: ObservableMap<&str, i32> = ObservableMap::new();

    let flag = DropFlag(dropped.clone());
    let _handle = map.once("k", move |_, _| {
        flag.touch();
    });

    assert!(!dropped.get());
    map.set("k", 1);
    assert!(dropped.get(), "Retired one-shot watcher should drop its closure");
}

#[test]
fn map_drop_releases_watchers() {
    let dropped = Rc::new(Cell::new(false));

    let handle = {
        let map: ObservableMap<&str, i32> = ObservableMap::new();
        let flag = DropFlag(dropped.clone());
        map.watch("k", move |_, _| {
            flag.touch();
        })
        // map drops here
    };

    assert!(dropped.get(), "Dropping the map should drop its watchers");
    assert!(!handle.is_active());
    assert!(!handle.cancel(), "Handle of a dropped map is inert");
}

#[test]
fn handle_does_not_keep_map_alive() {
    let map: ObservableMap<&str, i32> = ObservableMap::new();
    let weak = map.downgrade();
    let _handle = map.watch("k", |_, _| {});

    drop(map);
    assert!(weak.upgrade().is_none());
}

#[test]
fn clone_keeps_map_alive() {
    let hits = Rc::new(Cell::new(0));
    let map: ObservableMap<&str, i32> = ObservableMap::new();
    let _h = map.watch("k", cloned!(hits => move |_, _| hits.set(hits.get() + 1)));

    let other = map.clone();
    drop(map);

    // Still the same map, watchers included
    other.set("k", 1);
    assert_eq!(hits.get(), 1);
}

#[test]
fn cancel_all_releases_every_watcher() {
    let first = Rc::new(Cell::new(false));
    let second = Rc::new(Cell::new(false));
    let map: ObservableMap<&str, i32> = ObservableMap::new();

    let f1 = DropFlag(first.clone());
    let f2 = DropFlag(second.clone());
    map.watch("k", move |_, _| {
        f1.touch();
    });
    map.once("k", move |_, _| {
        f2.touch();
    });

    assert_eq!(map.cancel_all("k"), 2);
    assert!(first.get());
    assert!(second.get());
}
