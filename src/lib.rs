//! gcref - weak references for garbage-collected interpreter runtimes
//!
//! A weak reference observes a collector-managed object without extending
//! its lifetime. When the collector reclaims the object, a finalizer clears
//! the reference so it reads as empty instead of yielding a dead value.
//!
//! The host collector is consumed through the `Collector` trait. `Heap` is a
//! small reference implementation for embedding and tests.

pub mod error;
pub mod finalize;
pub mod heap;
pub mod liveness;
pub mod logging;
pub mod value_map;
pub mod weak;

// Re-export core types
pub use error::{RefError, Result};
pub use finalize::{Affiliation, Collector, Finalizer, HandleId, InstanceId, PinSet, Roots};
pub use heap::{Heap, HeapConfig, ObjectKind, ObjectRef, TeardownPolicy};
pub use liveness::is_alive;
pub use value_map::WeakValueMap;
pub use weak::WeakReference;

/// Host hook: an interpreter instance has started
pub fn on_runtime_init(instance: InstanceId) {
    liveness::record_initialized(instance);
}

/// Host hook: an interpreter instance is being torn down
pub fn on_runtime_teardown(instance: InstanceId) {
    liveness::record_finalized(instance);
}

/// Check if the interpreter instance is still usable
///
/// Weak reference operations against a torn-down instance are a caller
/// error; ask here first.
#[inline]
pub fn is_runtime_alive(instance: InstanceId) -> bool {
    liveness::is_alive(instance)
}
