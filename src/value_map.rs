//! Weak value map - a map whose values can still be garbage collected
//!
//! Each value is held through its own `WeakReference`. Alongside it, every
//! insert defines a cleanup finalizer on the value that records the entry's
//! key and handle identity in a shared dead list. The list is drained on
//! every map operation, so pruning costs O(expired) rather than O(len).

use std::borrow::Borrow;
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::finalize::{Collector, HandleId, Roots};
use crate::logging::trace;
use crate::weak::WeakReference;

type DeadList<K> = Rc<RefCell<Vec<(K, HandleId)>>>;

/// Map from keys to weakly held values
///
/// An entry disappears once its value is collected: reads return `None`
/// immediately, and the entry itself is pruned by the next operation on the
/// map. Replacing or removing a key releases the old reference, so a late
/// finalizer for an old value never evicts the entry that replaced it.
///
/// Dropping the map releases every pin its references hold.
pub struct WeakValueMap<K, T: Clone + 'static> {
    map: FxHashMap<K, WeakReference<T>>,
    /// Entries whose value was finalized, filled by cleanup finalizers
    dead: DeadList<K>,
}

impl<K, T> WeakValueMap<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            dead: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Get a value, `None` if absent or collected
    pub fn get<Q, C>(&mut self, collector: &mut C, key: &Q) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        C: Collector<Target = T>,
    {
        self.prune();
        let value = self.map.get(key)?.object(collector);
        // `object` may have run a collection
        self.prune();
        value
    }

    /// Set a value, replacing any previous one for `key`
    ///
    /// Fails with `NotFinalizable` if `value` can not be weakly held; the map
    /// is unchanged in that case.
    pub fn insert<C>(&mut self, collector: &mut C, key: K, value: T) -> Result<()>
    where
        C: Collector<Target = T>,
    {
        self.prune();

        let reference = WeakReference::with_target(collector, value.clone())?;
        let dead = Rc::clone(&self.dead);
        let entry = (key.clone(), reference.id());
        collector.define_finalizer(
            &value,
            Box::new(move |_: &mut dyn Roots| dead.borrow_mut().push(entry)),
        )?;

        if let Some(mut previous) = self.map.insert(key, reference) {
            previous.release(collector);
        }
        Ok(())
    }

    /// Remove an entry, returning its value if still alive
    pub fn remove<Q, C>(&mut self, collector: &mut C, key: &Q) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        C: Collector<Target = T>,
    {
        self.prune();
        let mut reference = self.map.remove(key)?;
        let value = reference.read(collector);
        reference.release(collector);
        value
    }

    /// Drop every entry whose value is gone, including unreachable values
    /// whose finalizers have not been delivered yet
    pub fn update<C>(&mut self, collector: &mut C)
    where
        C: Collector<Target = T>,
    {
        self.prune();

        let before = self.map.len();
        self.map.retain(|_, reference| reference.read(collector).is_some());

        let swept = before - self.map.len();
        if swept > 0 {
            trace!(target: "gcref::weak", swept, "unreachable map entries removed");
        }
    }

    /// Number of entries, including ones not yet pruned
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Remove entries reported by cleanup finalizers
    fn prune(&mut self) {
        let dead = std::mem::take(&mut *self.dead.borrow_mut());
        if dead.is_empty() {
            return;
        }

        let mut pruned = 0usize;
        for (key, id) in dead {
            // A replaced entry reports the old handle; leave the new one alone
            if self.map.get(&key).is_some_and(|reference| reference.id() == id) {
                self.map.remove(&key);
                pruned += 1;
            }
        }

        if pruned > 0 {
            trace!(target: "gcref::weak", pruned, "expired map entries removed");
        }
    }
}

impl<K, T> Default for WeakValueMap<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
