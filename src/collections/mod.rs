// ============================================================================
// keywatch - Collections
// ============================================================================

pub mod map;

pub use map::{ObservableMap, WeakObservableMap};
