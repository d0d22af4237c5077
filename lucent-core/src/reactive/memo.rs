//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the memo is marked dirty and queued.
//!
//! 4. During the flush, a dirty memo that still has readers recomputes and
//!    notifies them only if the new value differs from the old one. A dirty
//!    memo without readers waits until it is read again.
//!
//! # Re-entrancy
//!
//! A memo whose computation reads the memo itself gets the previous value
//! back (`try_get`). Before the first value exists there is nothing to return,
//! so `try_get` yields `None` and `get` panics. Callers that can hit this case
//! guard it themselves.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::context::ReactiveContext;
use super::runtime::{untrack, Reactive, ReactiveHandle, Runtime};
use super::scope::on_cleanup;
use super::subscriber::SubscriberId;
use super::trigger::Trigger;

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// The memo needs to recompute before its value is used.
    Dirty,

    /// The memo has been disposed and no longer tracks anything.
    Disposed,
}

struct MemoInner<T: 'static> {
    subscriber_id: SubscriberId,
    output: Trigger,
    compute: Box<dyn Fn() -> T>,
    equals: Box<dyn Fn(&T, &T) -> bool>,
    value: RefCell<Option<T>>,
    state: Cell<MemoState>,
    computing: Cell<bool>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    self_weak: Weak<MemoInner<T>>,
    _handle: ReactiveHandle,
}

struct ComputingGuard<'a>(&'a Cell<bool>);

impl<'a> ComputingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T: Clone + 'static> MemoInner<T> {
    fn run_cleanups(&self) {
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
    }

    fn recompute(&self) {
        let Some(this) = self.self_weak.upgrade() else {
            return;
        };
        self.run_cleanups();
        Runtime::clear_dependencies(self.subscriber_id);

        let new_value = {
            let _computing = ComputingGuard::enter(&self.computing);
            let _ctx = ReactiveContext::enter(this);
            (self.compute)()
        };

        let changed = match &*self.value.borrow() {
            Some(old) => !(self.equals)(old, &new_value),
            None => false,
        };
        *self.value.borrow_mut() = Some(new_value);
        if self.state.get() == MemoState::Dirty {
            self.state.set(MemoState::Clean);
        }

        if changed {
            self.output.notify();
        }
    }
}

impl<T: Clone + 'static> Reactive for MemoInner<T> {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_dirty(&self) {
        if self.state.get() == MemoState::Clean {
            self.state.set(MemoState::Dirty);
        }
    }

    fn update(&self) {
        if self.state.get() == MemoState::Dirty
            && !self.computing.get()
            && self.output.subscriber_count() > 0
        {
            self.recompute();
        }
    }

    fn is_eager(&self) -> bool {
        false
    }

    fn add_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        if self.state.get() == MemoState::Disposed {
            cleanup();
        } else {
            self.cleanups.borrow_mut().push(cleanup);
        }
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// The equality function decides whether a recomputation is observable:
/// readers are only invalidated when it returns false.
pub struct Memo<T: 'static>(Rc<MemoInner<T>>);

impl<T: Clone + 'static> Memo<T> {
    /// Create a new memo compared with `PartialEq`.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
        T: PartialEq,
    {
        Self::with_equals(compute, |a, b| a == b)
    }

    /// Create a new memo with a custom equality function.
    ///
    /// The memo is owned by the running computation or, failing that, the
    /// current scope, and is disposed with it. The owner holds it weakly.
    pub fn with_equals<F, E>(compute: F, equals: E) -> Self
    where
        F: Fn() -> T + 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        let subscriber_id = SubscriberId::new();
        let inner = Rc::new_cyclic(|weak: &Weak<MemoInner<T>>| {
            let as_dyn: Weak<dyn Reactive> = weak.clone();
            MemoInner {
                subscriber_id,
                output: Trigger::new(),
                compute: Box::new(compute),
                equals: Box::new(equals),
                value: RefCell::new(None),
                state: Cell::new(MemoState::Dirty),
                computing: Cell::new(false),
                cleanups: RefCell::new(Vec::new()),
                self_weak: weak.clone(),
                _handle: Runtime::register(subscriber_id, as_dyn),
            }
        });

        let owned = Rc::downgrade(&inner);
        on_cleanup(move || {
            if let Some(inner) = owned.upgrade() {
                Memo(inner).dispose();
            }
        });
        Self(inner)
    }

    /// Get the subscriber ID for this memo.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.0.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the computation reads this memo before its first value
    /// exists. Use [`Memo::try_get`] to handle that case.
    pub fn get(&self) -> T {
        self.try_get()
            .expect("memo read itself during its first evaluation")
    }

    /// Get the current value, or `None` if the memo is still computing its
    /// first value.
    pub fn try_get(&self) -> Option<T> {
        let inner = &self.0;
        match inner.state.get() {
            MemoState::Disposed => {
                if let Some(value) = inner.value.borrow().clone() {
                    return Some(value);
                }
                return Some(untrack(|| (inner.compute)()));
            }
            _ if inner.computing.get() => {
                return inner.value.borrow().clone();
            }
            MemoState::Dirty => inner.recompute(),
            MemoState::Clean => {}
        }

        // Recompute before tracking so our own notification cannot reach us.
        inner.output.track();
        inner.value.borrow().clone()
    }

    /// Get the cached value without tracking or recomputing.
    pub fn get_untracked(&self) -> Option<T> {
        self.0.value.borrow().clone()
    }

    /// Mark the memo as needing recomputation.
    pub fn mark_dirty(&self) {
        self.0.mark_dirty();
    }

    /// Stop tracking dependencies and release cleanups. Idempotent.
    pub fn dispose(&self) {
        if self.0.state.get() == MemoState::Disposed {
            return;
        }
        self.0.state.set(MemoState::Disposed);
        self.0.run_cleanups();
        Runtime::clear_dependencies(self.0.subscriber_id);
    }

    /// Check if the memo has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.0.state.get() == MemoState::Disposed
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        self.0.state.get()
    }

    /// Get the number of computations reading this memo.
    pub fn dependent_count(&self) -> usize {
        self.0.output.subscriber_count()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.0.value.borrow().is_some()
    }

    /// Check if two handles refer to the same memo.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("subscriber_id", &self.0.subscriber_id)
            .field("state", &self.0.state.get())
            .field("value", &*self.0.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{batch, Effect, Signal};

    fn counter() -> Rc<Cell<usize>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn memo_computes_on_first_access() {
        let calls = counter();
        let c = calls.clone();
        let memo = Memo::new(move || {
            c.set(c.get() + 1);
            42
        });

        assert!(!memo.has_value());
        assert_eq!(calls.get(), 0);

        assert_eq!(memo.get(), 42);
        assert_eq!(calls.get(), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn memo_caches_value_when_clean() {
        let calls = counter();
        let c = calls.clone();
        let memo = Memo::new(move || {
            c.set(c.get() + 1);
            42
        });

        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn memo_recomputes_after_dependency_changes() {
        let signal = Signal::new(2);
        let s = signal.clone();
        let memo = Memo::new(move || s.get() * 10);

        assert_eq!(memo.get(), 20);
        signal.set(3);
        assert_eq!(memo.state(), MemoState::Dirty);
        assert_eq!(memo.get(), 30);
        assert_eq!(memo.state(), MemoState::Clean);
    }

    #[test]
    fn unchanged_memo_does_not_wake_readers() {
        let signal = Signal::new(1);
        let s = signal.clone();
        let parity = Memo::new(move || s.get() % 2);

        let runs = counter();
        let (p, r) = (parity.clone(), runs.clone());
        let _effect = Effect::new(move || {
            p.get();
            r.set(r.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        signal.set(3);
        assert_eq!(runs.get(), 1);

        signal.set(4);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn chained_memos_propagate_once_per_batch() {
        let base = Signal::new(1);
        let b = base.clone();
        let doubled = Memo::new(move || b.get() * 2);
        let d = doubled.clone();
        let plus_ten = Memo::new(move || d.get() + 10);

        let runs = counter();
        let seen = counter();
        let (p, r, s) = (plus_ten.clone(), runs.clone(), seen.clone());
        let _effect = Effect::new(move || {
            s.set(p.get() as usize);
            r.set(r.get() + 1);
        });
        assert_eq!(seen.get(), 12);

        batch(|| {
            base.set(2);
            base.set(5);
        });
        assert_eq!(seen.get(), 20);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn disposed_memo_stops_tracking() {
        let signal = Signal::new(1);
        let s = signal.clone();
        let memo = Memo::new(move || s.get());
        assert_eq!(memo.get(), 1);

        memo.dispose();
        memo.dispose();
        assert!(memo.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(7);
        assert_eq!(memo.get(), 1);
    }

    #[test]
    fn re_entrant_read_before_first_value_yields_none() {
        let slot: Rc<RefCell<Option<Memo<i32>>>> = Rc::new(RefCell::new(None));
        let inner_seen = Rc::new(Cell::new(true));

        let (slot_clone, seen) = (slot.clone(), inner_seen.clone());
        let memo = Memo::new(move || {
            let me = slot_clone.borrow().clone();
            if let Some(me) = me {
                seen.set(me.try_get().is_some());
            }
            1
        });
        *slot.borrow_mut() = Some(memo.clone());

        assert_eq!(memo.get(), 1);
        assert!(!inner_seen.get());
    }
}
