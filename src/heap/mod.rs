//! Reference heap - a small single-threaded collector for hosting weak references
//!
//! Implements the collector boundary so weak references can be used and
//! tested without an external interpreter. Not a general GC:
//! - Reachability is driven by host-held strong roots (`retain`/`release`)
//! - `Emittable` objects carry their finalizers and are destroyed as soon as
//!   their last root is released (direct affiliation)
//! - `Plain` objects keep finalizers in an instance-wide side table and are
//!   only reclaimed by `collect` (indirect affiliation)
//! - `Immediate` objects refuse finalizers
//!
//! Freed slots are reused with a bumped generation, so a stale `ObjectRef`
//! never aliases a newer object.

mod config;

#[cfg(test)]
mod tests;

pub use config::{HeapConfig, TeardownPolicy};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::time::Instant;

use crate::error::{RefError, Result};
use crate::finalize::{Affiliation, Collector, Finalizer, HandleId, InstanceId, PinSet, Roots};
use crate::liveness;
use crate::logging::{debug, log_collect_complete, trace};

type FinalizerList = SmallVec<[Finalizer; 1]>;

/// Handle to an object on the reference heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    index: u32,
    generation: u32,
}

impl ObjectRef {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Object type, deciding how finalizers attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Carries native finalization hooks
    Emittable,
    /// No hooks, finalizers go through the side table
    Plain,
    /// Refuses finalizers
    Immediate,
}

impl ObjectKind {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Emittable => "Emittable",
            Self::Plain => "Plain",
            Self::Immediate => "Immediate",
        }
    }
}

struct Object {
    kind: ObjectKind,
    strong: usize,
    /// Direct finalizers
    finalizers: FinalizerList,
}

struct Entry {
    generation: u32,
    object: Option<Object>,
}

/// Heap statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapStats {
    pub collections: usize,
    pub objects_reclaimed: usize,
    pub finalizers_run: usize,
}

/// Single-threaded reference collector
pub struct Heap {
    instance: InstanceId,
    config: HeapConfig,
    entries: Vec<Entry>,
    free: Vec<u32>,
    /// Indirect finalizers keyed by object identity
    side_table: FxHashMap<ObjectRef, FinalizerList>,
    pins: PinSet,
    stats: HeapStats,
    torn_down: bool,
}

impl Heap {
    /// Create a heap and record its instance as alive
    pub fn new(config: HeapConfig) -> Self {
        let instance = InstanceId::next();
        let heap = Self {
            instance,
            entries: Vec::with_capacity(config.initial_capacity),
            free: Vec::new(),
            side_table: FxHashMap::default(),
            pins: PinSet::new(),
            stats: HeapStats::default(),
            torn_down: false,
            config,
        };
        liveness::record_initialized(instance);
        heap
    }

    /// Allocate an object holding one strong root
    ///
    /// Fails with `HeapExhausted` once every addressable slot is in use.
    pub fn alloc(&mut self, kind: ObjectKind) -> Result<ObjectRef> {
        let object = Object {
            kind,
            strong: 1,
            finalizers: SmallVec::new(),
        };

        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.object = Some(object);
            return Ok(ObjectRef {
                index,
                generation: entry.generation,
            });
        }

        let index = next_index(self.entries.len())?;
        self.entries.push(Entry {
            generation: 0,
            object: Some(object),
        });
        Ok(ObjectRef { index, generation: 0 })
    }

    /// Add a strong root to a live object
    pub fn retain(&mut self, obj: ObjectRef) {
        if let Some(object) = self.object_mut(obj) {
            object.strong += 1;
        }
    }

    /// Drop a strong root
    ///
    /// An `Emittable` losing its last root is destroyed immediately and its
    /// finalizers run before this returns.
    pub fn release(&mut self, obj: ObjectRef) {
        let Some(object) = self.object_mut(obj) else {
            return;
        };
        object.strong = object.strong.saturating_sub(1);

        if object.strong == 0 && object.kind == ObjectKind::Emittable {
            let due = self.reclaim(obj.index);
            self.run_finalizers(due);
        }
    }

    /// Reclaim every object without strong roots and deliver its finalizers
    ///
    /// Returns the number of objects reclaimed.
    pub fn collect(&mut self) -> usize {
        let start = Instant::now();
        let mut due = Vec::new();
        let mut reclaimed = 0;

        // Every index fits in u32, see `next_index`
        for index in 0..self.entries.len() {
            let unrooted = matches!(&self.entries[index].object, Some(object) if object.strong == 0);
            if unrooted {
                due.extend(self.reclaim(index as u32));
                reclaimed += 1;
            }
        }

        // Sweep first, then deliver, so finalizers see a consistent heap
        self.run_finalizers(due);
        self.stats.collections += 1;

        log_collect_complete(start.elapsed().as_micros() as u64, reclaimed, self.live_count());
        reclaimed
    }

    /// Whether `obj` still refers to a live object
    pub fn is_live(&self, obj: ObjectRef) -> bool {
        self.object(obj).is_some()
    }

    pub fn kind(&self, obj: ObjectRef) -> Option<ObjectKind> {
        self.object(obj).map(|object| object.kind)
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.object.is_some()).count()
    }

    pub fn pinned_count(&self) -> usize {
        self.pins.len()
    }

    pub fn is_pinned(&self, handle: HandleId) -> bool {
        self.pins.contains(handle)
    }

    /// Finalizers defined but not yet delivered
    pub fn pending_finalizers(&self) -> usize {
        let direct: usize = self
            .entries
            .iter()
            .filter_map(|entry| entry.object.as_ref())
            .map(|object| object.finalizers.len())
            .sum();
        let indirect: usize = self.side_table.values().map(|list| list.len()).sum();
        direct + indirect
    }

    /// Tear the instance down
    pub fn teardown(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        liveness::record_finalized(self.instance);

        let mut due: Vec<Finalizer> = Vec::new();
        for entry in &mut self.entries {
            if let Some(object) = entry.object.take() {
                due.extend(object.finalizers);
            }
        }
        for (_, list) in self.side_table.drain() {
            due.extend(list);
        }

        match self.config.teardown {
            TeardownPolicy::Fire => self.run_finalizers(due),
            TeardownPolicy::Drop => {
                debug!(target: "gcref::heap", dropped = due.len(), "discarding pending finalizers");
            }
        }

        self.entries.clear();
        self.free.clear();
        self.pins.clear();
    }

    fn object(&self, obj: ObjectRef) -> Option<&Object> {
        let entry = self.entries.get(obj.index as usize)?;
        if entry.generation != obj.generation {
            return None;
        }
        entry.object.as_ref()
    }

    fn object_mut(&mut self, obj: ObjectRef) -> Option<&mut Object> {
        let entry = self.entries.get_mut(obj.index as usize)?;
        if entry.generation != obj.generation {
            return None;
        }
        entry.object.as_mut()
    }

    /// Free the slot at `index` and hand back its finalizers
    fn reclaim(&mut self, index: u32) -> FinalizerList {
        let entry = &mut self.entries[index as usize];
        let reference = ObjectRef {
            index,
            generation: entry.generation,
        };

        let mut due = match entry.object.take() {
            Some(object) => object.finalizers,
            None => return SmallVec::new(),
        };
        entry.generation = entry.generation.wrapping_add(1);

        if let Some(indirect) = self.side_table.remove(&reference) {
            due.extend(indirect);
        }

        self.free.push(index);
        self.stats.objects_reclaimed += 1;
        trace!(target: "gcref::heap", index, finalizers = due.len(), "object reclaimed");
        due
    }

    fn run_finalizers<I>(&mut self, due: I)
    where
        I: IntoIterator<Item = Finalizer>,
    {
        for finalizer in due {
            finalizer(&mut *self);
            self.stats.finalizers_run += 1;
        }
    }
}

/// Index for the slot after `len` existing ones
fn next_index(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| RefError::HeapExhausted)
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(HeapConfig::default())
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Roots for Heap {
    fn pin(&mut self, handle: HandleId) {
        self.pins.pin(handle);
    }

    fn unpin(&mut self, handle: HandleId) {
        self.pins.unpin(handle);
    }
}

impl Collector for Heap {
    type Target = ObjectRef;

    fn instance(&self) -> InstanceId {
        self.instance
    }

    fn define_finalizer(&mut self, target: &ObjectRef, callback: Finalizer) -> Result<Affiliation> {
        let Some(kind) = self.kind(*target) else {
            // Already reclaimed: deliver right away
            callback(&mut *self);
            self.stats.finalizers_run += 1;
            return Ok(Affiliation::Indirect);
        };

        match kind {
            ObjectKind::Immediate => Err(RefError::NotFinalizable {
                type_name: kind.type_name(),
            }),
            ObjectKind::Emittable => {
                if let Some(object) = self.object_mut(*target) {
                    object.finalizers.push(callback);
                }
                Ok(Affiliation::Direct)
            }
            ObjectKind::Plain => {
                self.side_table.entry(*target).or_default().push(callback);
                Ok(Affiliation::Indirect)
            }
        }
    }

    fn is_reachable(&self, target: &ObjectRef) -> bool {
        self.object(*target).is_some_and(|object| object.strong > 0)
    }

    fn collect(&mut self) {
        Heap::collect(self);
    }

    fn pins(&self) -> &PinSet {
        &self.pins
    }
}
