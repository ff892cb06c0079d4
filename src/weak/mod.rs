//! Weak references - observe a collector-managed object without keeping it alive
//!
//! Design: the handle never holds a strong edge to its target. Instead:
//! 1. Each bind allocates a fresh slot cell and defines a finalizer on the
//!    target that closes over that cell only
//! 2. The handle is pinned while bound, since the finalizer writes into it
//! 3. The finalizer clears the cell and unpins the handle
//! 4. Reads re-check the collector's liveness flag as a backstop for
//!    finalizer delivery that has not happened yet
//! 5. Dropping a bound handle disarms its cell and unpins it through the
//!    collector's shared pin set
//!
//! Every operation runs on the interpreter's single thread of control. The
//! only hazard is temporal: a finalizer may fire between any two calls.

mod slot;


use std::fmt;
use std::rc::Rc;

use crate::error::{RefError, Result};
use crate::finalize::{Affiliation, Collector, Finalizer, HandleId, InstanceId, PinSet, Roots};
use crate::liveness;
use crate::logging::{log_bind, log_bind_rejected, log_finalized, log_stale_read, log_superseded};
use slot::{Fired, SlotCell};

/// Weak reference handle
///
/// Slot state machine: `Empty -(bind)-> Bound(target) -(finalizer | rebind)->
/// Empty | Bound(new)`. Only `bind` enters `Bound`.
pub struct WeakReference<T: Clone + 'static> {
    id: HandleId,
    /// Instance the current binding was made against
    instance: Option<InstanceId>,
    /// Cell of the current binding; replaced on every bind
    slot: Option<Rc<SlotCell<T>>>,
    affiliation: Option<Affiliation>,
    /// Pin set of the collector the current binding lives in, for `Drop`
    pins: Option<PinSet>,
}

impl<T: Clone + 'static> WeakReference<T> {
    /// Create an empty weak reference
    pub fn new() -> Self {
        Self {
            id: HandleId::next(),
            instance: None,
            slot: None,
            affiliation: None,
            pins: None,
        }
    }

    /// Create a weak reference bound to `target`
    pub fn with_target<C>(collector: &mut C, target: T) -> Result<Self>
    where
        C: Collector<Target = T>,
    {
        let mut reference = Self::new();
        reference.bind(collector, target)?;
        Ok(reference)
    }

    /// Identity used as this handle's pin key
    #[inline]
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Bind to `target`, superseding any previous binding
    ///
    /// On error the handle is left exactly as it was.
    pub fn bind<C>(&mut self, collector: &mut C, target: T) -> Result<Affiliation>
    where
        C: Collector<Target = T>,
    {
        let cell = SlotCell::new();
        let finalizer = self.finalizer_for(&cell);

        // Must come first: it is the only step that can fail
        let affiliation = match collector.define_finalizer(&target, finalizer) {
            Ok(affiliation) => affiliation,
            Err(err) => {
                if let RefError::NotFinalizable { type_name } = &err {
                    log_bind_rejected(self.id, type_name);
                }
                return Err(err);
            }
        };

        self.disarm(collector);

        // Pin before the slot is written. A cell that already left Pending
        // had its finalizer run inside define_finalizer.
        if cell.is_pending() {
            collector.pin(self.id);
            cell.install(target);
        }

        self.slot = Some(cell);
        self.affiliation = Some(affiliation);
        self.instance = Some(collector.instance());
        self.pins = Some(collector.pins().clone());

        log_bind(self.id, affiliation);
        Ok(affiliation)
    }

    /// Current target, or `None` once it has been collected
    pub fn read<C>(&self, collector: &mut C) -> Option<T>
    where
        C: Collector<Target = T>,
    {
        let cell = self.slot.as_ref()?;
        let target = cell.get()?;

        if !collector.is_reachable(&target) {
            if cell.clear() {
                collector.unpin(self.id);
            }
            log_stale_read(self.id);
            return None;
        }

        Some(target)
    }

    /// Current target, treating a torn-down instance as having collected it
    ///
    /// Indirect bindings run a collection first, since their finalizers are
    /// only delivered by a collection cycle.
    pub fn object<C>(&self, collector: &mut C) -> Option<T>
    where
        C: Collector<Target = T>,
    {
        let instance = self.instance?;
        if !liveness::is_alive(instance) {
            // Finalizers no longer run, assume the target is gone
            return None;
        }

        self.update(collector);
        self.read(collector)
    }

    /// Bring an indirect binding up to date
    pub fn update<C: Collector>(&self, collector: &mut C) {
        if self.indirect() {
            collector.collect();
        }
    }

    /// Define an additional finalizer on the referenced object
    pub fn define_finalizer<C>(&self, collector: &mut C, finalizer: Finalizer) -> Result<Affiliation>
    where
        C: Collector<Target = T>,
    {
        let target = self.object(collector).ok_or(RefError::DeadObject)?;
        collector.define_finalizer(&target, finalizer)
    }

    /// Drop the current binding and its pin, leaving the handle empty
    pub fn release<R: Roots + ?Sized>(&mut self, roots: &mut R) {
        self.disarm(roots);
        self.affiliation = None;
        self.instance = None;
    }

    /// Whether the current binding's finalizer is indirect
    #[inline]
    pub fn indirect(&self) -> bool {
        self.affiliation.is_some_and(Affiliation::is_indirect)
    }

    #[inline]
    pub fn affiliation(&self) -> Option<Affiliation> {
        self.affiliation
    }

    /// Whether the slot holds a target, without consulting the collector
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.slot.as_ref().is_some_and(|cell| cell.is_bound())
    }

    fn finalizer_for(&self, cell: &Rc<SlotCell<T>>) -> Finalizer {
        let cell = Rc::clone(cell);
        let id = self.id;
        Box::new(move |roots: &mut dyn Roots| {
            let fired = cell.fire();
            if fired.releases_pin() {
                roots.unpin(id);
            }
            if fired == Fired::Cleared {
                log_finalized(id);
            }
        })
    }

    fn disarm<R: Roots + ?Sized>(&mut self, roots: &mut R) {
        if let Some(old) = self.slot.take() {
            if old.supersede() {
                roots.unpin(self.id);
            }
            log_superseded(self.id);
        }
    }
}

impl<T: Clone + 'static> Default for WeakReference<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Drop for WeakReference<T> {
    fn drop(&mut self) {
        // The pending finalizer finds a superseded cell and does nothing
        if let Some(cell) = self.slot.take() {
            if cell.supersede() {
                if let Some(pins) = &self.pins {
                    pins.unpin(self.id);
                }
            }
        }
    }
}

impl<T: Clone + 'static> fmt::Debug for WeakReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakReference")
            .field("id", &self.id)
            .field("bound", &self.is_bound())
            .field("affiliation", &self.affiliation)
            .finish()
    }
}
