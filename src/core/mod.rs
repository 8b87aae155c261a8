// ============================================================================
// keywatch - Core Module
// Fundamental types, options and errors shared by the map and its watchers
// ============================================================================

pub mod error;
pub mod options;
pub mod types;

// Re-export commonly used items
pub use error::{DispatchError, WatcherFailure};
pub use options::{MapOptions, PanicPolicy, WatchOptions};
pub use types::{EqualsFn, WatchFn, WatcherId, WatcherRecord};
