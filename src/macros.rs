// ============================================================================
// keywatch - Ergonomic Macros
// ============================================================================

/// Helper macro to clone variables into a move closure.
///
/// Watcher callbacks are `'static`, so anything they use has to be moved in.
/// This saves the usual `let x = x.clone();` preamble.
///
/// # Usage
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use keywatch::{cloned, ObservableMap};
///
/// let map: ObservableMap<&str, i32> = ObservableMap::new();
/// let hits = Rc::new(Cell::new(0));
///
/// let _h = map.watch("k", cloned!(hits => move |_, _| hits.set(hits.get() + 1)));
/// map.set("k", 1);
/// assert_eq!(hits.get(), 1);
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Capture a weak reference to a map into a watcher callback.
///
/// The body runs only while the map is still alive, with `$map` rebound to a
/// strong handle. Avoids the `Rc` cycle a captured clone would create.
///
/// # Usage
///
/// ```rust
/// use keywatch::{with_map, ObservableMap};
///
/// let map: ObservableMap<&str, i32> = ObservableMap::new();
///
/// // Mirror "a" into "b"
/// let _h = map.watch("a", with_map!(map => move |new, _| {
///     match new {
///         Some(v) => { map.set("b", *v); }
///         None => { map.delete("b"); }
///     }
/// }));
///
/// map.set("a", 3);
/// assert_eq!(map.get("b"), Some(3));
/// ```
#[macro_export]
macro_rules! with_map {
    ($map:ident => move |$new:pat_param, $old:pat_param| $body:expr) => {
        {
            let weak = $map.downgrade();
            move |$new, $old| {
                if let Some($map) = weak.upgrade() {
                    $body
                }
            }
        }
    };
}
