//! Collector boundary - what the weak reference core needs from its host
//!
//! The host interpreter owns object reachability, finalizer delivery and
//! root protection. This module only names those capabilities:
//! - `Collector::define_finalizer` attaches a one-shot callback to a target
//! - `Collector::is_reachable` is the authoritative liveness query
//! - `Roots::pin`/`Roots::unpin` protect a handle from being collected
//! - `Collector::pins` exposes the same root set as a shared `PinSet`, so a
//!   handle dropped outside any collector call can still release its pin
//!
//! Delivery guarantee expected from implementors: a callback runs at most
//! once, no earlier than the point its target becomes unreachable. Whether
//! pending callbacks run or are dropped at instance teardown is up to the
//! host; the core tolerates both.

use crate::error::Result;
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Identity of one interpreter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate a process-unique instance identity
    pub fn next() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Identity of one weak reference handle, used as the pin key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// Allocate a process-unique handle identity
    pub fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// How a finalizer got attached to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affiliation {
    /// Through a hook intrinsic to the target's type
    Direct,
    /// Through an instance-wide side table keyed by object identity
    Indirect,
}

impl Affiliation {
    #[inline]
    pub fn is_indirect(self) -> bool {
        matches!(self, Self::Indirect)
    }
}

/// One-shot finalizer callback
///
/// The collector hands itself in as the root set so the callback can unpin
/// whatever it protected.
pub type Finalizer = Box<dyn FnOnce(&mut dyn Roots)>;

/// Pinned handle set shared between a collector and the handles it protects
///
/// Cloning yields another view of the same set.
#[derive(Debug, Clone, Default)]
pub struct PinSet {
    pins: Rc<RefCell<FxHashSet<HandleId>>>,
}

impl PinSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protect `handle` (idempotent)
    #[inline]
    pub fn pin(&self, handle: HandleId) {
        self.pins.borrow_mut().insert(handle);
    }

    /// Release `handle`, no-op if not pinned
    #[inline]
    pub fn unpin(&self, handle: HandleId) {
        self.pins.borrow_mut().remove(&handle);
    }

    #[inline]
    pub fn contains(&self, handle: HandleId) -> bool {
        self.pins.borrow().contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.pins.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.pins.borrow_mut().clear();
    }
}

/// Root protection owned by the collector
pub trait Roots {
    /// Protect `handle` from collection (idempotent)
    fn pin(&mut self, handle: HandleId);

    /// Release protection of `handle` (no-op if not pinned)
    fn unpin(&mut self, handle: HandleId);
}

/// Host collector capabilities consumed by weak references
pub trait Collector: Roots {
    /// Handle to a collector-managed value
    type Target: Clone;

    /// Instance this collector belongs to
    fn instance(&self) -> InstanceId;

    /// Attach `callback` to `target`
    ///
    /// Fails with `RefError::NotFinalizable` when the target's type forbids
    /// finalizers. A target that is already dead may have its callback run
    /// before this returns.
    fn define_finalizer(&mut self, target: &Self::Target, callback: Finalizer) -> Result<Affiliation>;

    /// Collector's authoritative liveness query
    fn is_reachable(&self, target: &Self::Target) -> bool;

    /// Run a collection cycle, delivering due finalizers
    fn collect(&mut self);

    /// Shared view of the root set behind `Roots::pin`/`Roots::unpin`
    fn pins(&self) -> &PinSet;
}
