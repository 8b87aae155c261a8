// ============================================================================
// keywatch - Reactivity Module
// Change detection, watcher bookkeeping and dispatch
// ============================================================================

pub mod dispatch;
pub mod equality;
pub mod registry;

pub use registry::{WatcherRegistry, WatcherSlot};
