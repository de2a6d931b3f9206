//! A shared handle to a [`NogoodSet`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::nogoods::Nogood;
use crate::nogoods::NogoodSet;

/// A cloneable handle to a nogood set shared between a producer (external
/// propagators) and a consumer (a nogood grounder or a solver). The
/// scheduling model is single-threaded cooperative, so interior mutability
/// suffices where the original used a lock.
#[derive(Clone, Debug, Default)]
pub struct SimpleNogoodContainer {
    inner: Rc<RefCell<NogoodSet>>,
}

impl SimpleNogoodContainer {
    pub fn new() -> SimpleNogoodContainer {
        SimpleNogoodContainer::default()
    }

    pub fn add_nogood(&self, nogood: Nogood) -> usize {
        self.inner.borrow_mut().add_nogood(nogood)
    }

    pub fn remove_nogood(&self, nogood: &Nogood) {
        self.inner.borrow_mut().remove_nogood(nogood)
    }

    pub fn nogood(&self, index: usize) -> Nogood {
        self.inner.borrow().nogood(index).clone()
    }

    pub fn nogood_count(&self) -> usize {
        self.inner.borrow().count()
    }

    pub fn slot_count(&self) -> usize {
        self.inner.borrow().slot_count()
    }

    pub fn is_live(&self, index: usize) -> bool {
        self.inner.borrow().is_live(index)
    }

    pub fn clear(&self) {
        *self.inner.borrow_mut() = NogoodSet::new();
    }

    /// Forgets rarely re-derived nogoods and compacts the slot vector.
    pub fn forget_least_frequently_added(&self) {
        let mut set = self.inner.borrow_mut();
        set.forget_least_frequently_added();
        set.defragment();
    }

    /// Runs `f` with the underlying set borrowed immutably.
    pub fn with_set<R>(&self, f: impl FnOnce(&NogoodSet) -> R) -> R {
        f(&self.inner.borrow())
    }
}
