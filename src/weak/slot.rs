//! Slot cells - one per bind, shared between a handle and its finalizer
//!
//! A fresh cell is allocated on every bind, and each finalizer closes over
//! exactly one cell. A finalizer that fires after its cell was replaced only
//! ever sees that old cell, so it can not clear a newer binding.

use std::cell::RefCell;
use std::rc::Rc;

/// Binding state of a single slot cell
#[derive(Debug)]
enum SlotState<T> {
    /// Finalizer defined, target not yet installed
    Pending,
    /// Holding the target; the owning handle is pinned
    Bound(T),
    /// Target gone, via finalizer or read backstop
    Cleared,
    /// Replaced by a newer bind, released or dropped; the finalizer must do nothing
    Superseded,
}

/// Effect a finalizer firing had on its cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fired {
    /// Cell was bound and is now cleared; unpin the handle
    Cleared,
    /// Fired during its own bind, before the pin
    Early,
    /// Binding was already cleared or superseded
    Ignored,
}

impl Fired {
    /// Whether the pin held for this cell must be released
    #[inline]
    pub(crate) fn releases_pin(self) -> bool {
        self == Self::Cleared
    }
}

pub(crate) struct SlotCell<T> {
    state: RefCell<SlotState<T>>,
}

impl<T: Clone> SlotCell<T> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(SlotState::Pending),
        })
    }

    /// Current target, if bound
    pub(crate) fn get(&self) -> Option<T> {
        match &*self.state.borrow() {
            SlotState::Bound(target) => Some(target.clone()),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), SlotState::Pending)
    }

    #[inline]
    pub(crate) fn is_bound(&self) -> bool {
        matches!(*self.state.borrow(), SlotState::Bound(_))
    }

    /// Pending -> Bound. Returns false if the cell left Pending already.
    pub(crate) fn install(&self, target: T) -> bool {
        let mut state = self.state.borrow_mut();
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Bound(target);
            true
        } else {
            false
        }
    }

    /// Finalizer entry point
    pub(crate) fn fire(&self) -> Fired {
        let mut state = self.state.borrow_mut();
        let fired = match *state {
            SlotState::Bound(_) => Fired::Cleared,
            SlotState::Pending => Fired::Early,
            SlotState::Cleared | SlotState::Superseded => return Fired::Ignored,
        };
        *state = SlotState::Cleared;
        fired
    }

    /// Bound -> Cleared. Returns true if the cell was bound (and pinned).
    pub(crate) fn clear(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if matches!(*state, SlotState::Bound(_)) {
            *state = SlotState::Cleared;
            true
        } else {
            false
        }
    }

    /// Disarm for a rebind, release or drop. Returns true if the cell was bound.
    pub(crate) fn supersede(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), SlotState::Superseded);
        matches!(previous, SlotState::Bound(_))
    }
}
