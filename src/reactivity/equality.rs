// ============================================================================
// keywatch - Equality Policies
// Functions deciding whether a `set` counts as a change
// ============================================================================
//
// Any of these can be plugged into `MapOptions::equals`. The map only fires
// watchers when the policy reports the new value as different.
// ============================================================================

// =============================================================================
// STRICT EQUALITY (Default)
// =============================================================================

/// Strict equality using PartialEq. The default policy of every map.
///
/// # Example
/// ```
/// use keywatch::reactivity::equality::equals;
///
/// assert!(equals(&42, &42));
/// assert!(!equals(&"on", &"off"));
/// ```
pub fn equals<V: PartialEq>(a: &V, b: &V) -> bool {
    a == b
}

// =============================================================================
// FLOATS (NaN-aware)
// =============================================================================

/// Equality for f64 where NaN equals NaN.
///
/// With plain PartialEq, storing NaN twice would fire watchers both times.
///
/// # Example
/// ```
/// use keywatch::{MapOptions, ObservableMap};
/// use keywatch::reactivity::equality::safe_equals_f64;
///
/// let map = ObservableMap::with_options(MapOptions::default().equals(safe_equals_f64));
/// map.set("ratio", f64::NAN);
///
/// let _h = map.watch("ratio", |_, _| panic!("NaN -> NaN is not a change"));
/// map.set("ratio", f64::NAN);
/// ```
pub fn safe_equals_f64(a: &f64, b: &f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

/// Equality for f32 where NaN equals NaN.
pub fn safe_equals_f32(a: &f32, b: &f32) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

/// NaN-aware equality for optional f64 values.
pub fn safe_equals_option_f64(a: &Option<f64>, b: &Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => safe_equals_f64(a, b),
        _ => false,
    }
}

// =============================================================================
// FORCING POLICIES
// =============================================================================

/// Never equal: every `set` is a change, even with an identical value.
///
/// # Example
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use keywatch::{MapOptions, ObservableMap};
/// use keywatch::reactivity::equality::never_equals;
///
/// let map = ObservableMap::with_options(MapOptions::default().equals(never_equals));
/// let hits = Rc::new(Cell::new(0));
/// let h = hits.clone();
/// let _w = map.watch("tick", move |_, _| h.set(h.get() + 1));
///
/// map.set("tick", 1).set("tick", 1);
/// assert_eq!(hits.get(), 2);
/// ```
pub fn never_equals<V>(_a: &V, _b: &V) -> bool {
    false
}

/// Always equal: only transitions from or to "no value" notify.
pub fn always_equals<V>(_a: &V, _b: &V) -> bool {
    true
}

// =============================================================================
// TESTS
// =============================================================================
