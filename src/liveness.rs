//! Liveness registry - which interpreter instances currently exist
//!
//! Multiple instances may be alive at the same time, so a process-wide set
//! is used to track them all. An instance is present between its init hook
//! and its teardown hook. The registry is consulted, never enforced: callers
//! ask before routing work to an instance.

use crate::finalize::InstanceId;
use crate::logging::{log_runtime_init, log_runtime_teardown};
use dashmap::DashSet;
use once_cell::sync::Lazy;

/// Global liveness registry (lock-free concurrent set)
static ALIVE: Lazy<DashSet<InstanceId>> = Lazy::new(|| DashSet::with_capacity(8));

/// Record that `instance` has been initialized
///
/// Calling twice for the same instance is harmless.
pub fn record_initialized(instance: InstanceId) {
    ALIVE.insert(instance);
    log_runtime_init(instance);
}

/// Record that `instance` has been torn down
///
/// No-op if the instance was never recorded.
pub fn record_finalized(instance: InstanceId) {
    if ALIVE.remove(&instance).is_some() {
        log_runtime_teardown(instance);
    }
}

/// Check if the interpreter instance is alive
#[inline]
pub fn is_alive(instance: InstanceId) -> bool {
    ALIVE.contains(&instance)
}

/// Number of instances currently alive
pub fn alive_count() -> usize {
    ALIVE.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let instance = InstanceId::next();
        assert!(!is_alive(instance));

        record_initialized(instance);
        assert!(is_alive(instance));

        record_finalized(instance);
        assert!(!is_alive(instance));
    }

    #[test]
    fn test_duplicate_init_is_idempotent() {
        let instance = InstanceId::next();
        record_initialized(instance);
        record_initialized(instance);
        assert!(is_alive(instance));

        record_finalized(instance);
        assert!(!is_alive(instance));
    }

    #[test]
    fn test_finalize_absent_is_noop() {
        let instance = InstanceId::next();
        record_finalized(instance);
        assert!(!is_alive(instance));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = InstanceId::next();
        let b = InstanceId::next();
        record_initialized(a);
        record_initialized(b);

        record_finalized(a);
        assert!(!is_alive(a));
        assert!(is_alive(b));

        record_finalized(b);
    }
}
