// ============================================================================
// keywatch - Primitives Module
// ============================================================================

pub mod handle;

pub use handle::WatchHandle;
