// ============================================================================
// keywatch - An Observable Map for Rust
// ============================================================================
//
// A HashMap whose keys can be watched. Watchers receive the new and the
// previous value on every change, synchronously and in registration order.
// ============================================================================

#[macro_use]
mod macros;

pub mod collections;
pub mod core;
pub mod primitives;
pub mod reactivity;

// Re-export core items at crate root for ergonomic access
pub use crate::core::error::{DispatchError, WatcherFailure};
pub use crate::core::options::{MapOptions, PanicPolicy, WatchOptions};
pub use crate::core::types::{watch_fn, EqualsFn, WatchFn, WatcherId};

pub use collections::{ObservableMap, WeakObservableMap};
pub use primitives::WatchHandle;

pub use reactivity::equality::{
    always_equals, equals, never_equals, safe_equals_f32, safe_equals_f64,
    safe_equals_option_f64,
};

// =============================================================================
// TESTS
// =============================================================================
