//! Tests for the reference heap

use super::*;
use std::cell::Cell;
use std::rc::Rc;

/// Test helper: finalizer that bumps a shared counter
fn counting_finalizer(count: &Rc<Cell<usize>>) -> Finalizer {
    let count = Rc::clone(count);
    Box::new(move |_roots: &mut dyn Roots| count.set(count.get() + 1))
}

#[cfg(test)]
mod allocation_tests {
    use super::*;

    #[test]
    fn test_alloc_and_release() {
        let mut heap = Heap::default();
        let obj = heap.alloc(ObjectKind::Plain).unwrap();
        assert!(heap.is_live(obj));
        assert_eq!(heap.kind(obj), Some(ObjectKind::Plain));

        heap.release(obj);
        // Plain objects wait for a collection
        assert!(heap.is_live(obj));
        assert!(!heap.is_reachable(&obj));

        assert_eq!(heap.collect(), 1);
        assert!(!heap.is_live(obj));
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_retained_object_survives_collect() {
        let mut heap = Heap::default();
        let obj = heap.alloc(ObjectKind::Plain).unwrap();
        heap.retain(obj);
        heap.release(obj);

        assert_eq!(heap.collect(), 0);
        assert!(heap.is_reachable(&obj));
    }

    #[test]
    fn test_reused_slot_gets_new_generation() {
        let mut heap = Heap::default();
        let old = heap.alloc(ObjectKind::Emittable).unwrap();
        heap.release(old);

        let new = heap.alloc(ObjectKind::Emittable).unwrap();
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(!heap.is_live(old));
        assert!(!heap.is_reachable(&old));
        assert!(heap.is_live(new));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_next_index_rejects_overflow() {
        assert_eq!(next_index(0), Ok(0));
        assert_eq!(next_index(u32::MAX as usize), Ok(u32::MAX));
        assert_eq!(next_index(u32::MAX as usize + 1), Err(RefError::HeapExhausted));
    }
}

#[cfg(test)]
mod finalizer_tests {
    use super::*;

    #[test]
    fn test_direct_finalizer_fires_on_release() {
        let mut heap = Heap::default();
        let count = Rc::new(Cell::new(0));
        let obj = heap.alloc(ObjectKind::Emittable).unwrap();

        let affiliation = heap.define_finalizer(&obj, counting_finalizer(&count)).unwrap();
        assert_eq!(affiliation, Affiliation::Direct);
        assert_eq!(heap.pending_finalizers(), 1);

        heap.release(obj);
        assert_eq!(count.get(), 1);
        assert_eq!(heap.pending_finalizers(), 0);
    }

    #[test]
    fn test_indirect_finalizer_fires_on_collect() {
        let mut heap = Heap::default();
        let count = Rc::new(Cell::new(0));
        let obj = heap.alloc(ObjectKind::Plain).unwrap();

        let affiliation = heap.define_finalizer(&obj, counting_finalizer(&count)).unwrap();
        assert_eq!(affiliation, Affiliation::Indirect);

        heap.release(obj);
        assert_eq!(count.get(), 0);

        heap.collect();
        assert_eq!(count.get(), 1);

        // At most once
        heap.collect();
        assert_eq!(count.get(), 1);
        assert_eq!(heap.stats().finalizers_run, 1);
    }

    #[test]
    fn test_immediate_is_not_finalizable() {
        let mut heap = Heap::default();
        let count = Rc::new(Cell::new(0));
        let obj = heap.alloc(ObjectKind::Immediate).unwrap();

        let err = heap.define_finalizer(&obj, counting_finalizer(&count)).unwrap_err();
        assert_eq!(err, RefError::NotFinalizable { type_name: "Immediate" });
        assert_eq!(heap.pending_finalizers(), 0);
    }

    #[test]
    fn test_dead_target_fires_immediately() {
        let mut heap = Heap::default();
        let count = Rc::new(Cell::new(0));
        let obj = heap.alloc(ObjectKind::Emittable).unwrap();
        heap.release(obj);

        heap.define_finalizer(&obj, counting_finalizer(&count)).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_finalizer_can_unpin() {
        let mut heap = Heap::default();
        let handle = HandleId::next();
        heap.pin(handle);
        assert!(heap.is_pinned(handle));

        let obj = heap.alloc(ObjectKind::Emittable).unwrap();
        heap.define_finalizer(&obj, Box::new(move |roots: &mut dyn Roots| roots.unpin(handle)))
            .unwrap();

        heap.release(obj);
        assert!(!heap.is_pinned(handle));
        assert_eq!(heap.pinned_count(), 0);
    }
}

#[cfg(test)]
mod teardown_tests {
    use super::*;

    #[test]
    fn test_teardown_marks_instance_dead() {
        let heap = Heap::default();
        let instance = heap.instance();
        assert!(liveness::is_alive(instance));

        heap.teardown();
        assert!(!liveness::is_alive(instance));
    }

    #[test]
    fn test_drop_marks_instance_dead() {
        let instance = {
            let heap = Heap::default();
            heap.instance()
        };
        assert!(!liveness::is_alive(instance));
    }

    #[test]
    fn test_teardown_fire_policy_runs_pending() {
        let mut heap = Heap::new(HeapConfig::default().with_teardown(TeardownPolicy::Fire));
        let count = Rc::new(Cell::new(0));
        let direct = heap.alloc(ObjectKind::Emittable).unwrap();
        let indirect = heap.alloc(ObjectKind::Plain).unwrap();
        heap.define_finalizer(&direct, counting_finalizer(&count)).unwrap();
        heap.define_finalizer(&indirect, counting_finalizer(&count)).unwrap();

        heap.teardown();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_teardown_drop_policy_discards_pending() {
        let mut heap = Heap::new(HeapConfig::default().with_teardown(TeardownPolicy::Drop));
        let count = Rc::new(Cell::new(0));
        let obj = heap.alloc(ObjectKind::Plain).unwrap();
        heap.define_finalizer(&obj, counting_finalizer(&count)).unwrap();

        heap.teardown();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_config_defaults() {
        let config = HeapConfig::default();
        assert_eq!(config.teardown, TeardownPolicy::Fire);
        assert_eq!(config.initial_capacity, 64);
    }
}
