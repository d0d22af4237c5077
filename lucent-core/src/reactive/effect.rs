//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued to re-run. Inside a
//!    batch it re-runs once, after the batch closes.
//!
//! 3. Before re-running, the effect runs its cleanups, clears its old
//!    dependencies and tracks new ones during execution.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::scope::on_cleanup;
use super::subscriber::SubscriberId;

struct EffectInner {
    subscriber_id: SubscriberId,
    run: Box<dyn Fn()>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
    self_weak: Weak<EffectInner>,
    _handle: ReactiveHandle,
}

impl EffectInner {
    fn run_cleanups(&self) {
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
    }

    fn execute(&self) {
        if self.disposed.get() {
            return;
        }
        let Some(this) = self.self_weak.upgrade() else {
            return;
        };

        self.run_cleanups();
        Runtime::clear_dependencies(self.subscriber_id);

        {
            let _ctx = ReactiveContext::enter(this);
            (self.run)();
        }

        self.run_count.set(self.run_count.get() + 1);
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_dirty(&self) {}

    fn update(&self) {
        self.execute();
    }

    fn is_eager(&self) -> bool {
        true
    }

    fn add_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        if self.disposed.get() {
            cleanup();
        } else {
            self.cleanups.borrow_mut().push(cleanup);
        }
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// ```
pub struct Effect(Rc<EffectInner>);

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it immediately.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let subscriber_id = SubscriberId::new();
        let inner = Rc::new_cyclic(|weak: &Weak<EffectInner>| {
            let as_dyn: Weak<dyn Reactive> = weak.clone();
            EffectInner {
                subscriber_id,
                run: Box::new(run),
                cleanups: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
                run_count: Cell::new(0),
                self_weak: weak.clone(),
                _handle: Runtime::register(subscriber_id, as_dyn),
            }
        });

        let effect = Self(inner);
        let owned = effect.clone();
        on_cleanup(move || owned.dispose());
        effect
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.0.subscriber_id
    }

    /// Execute the effect function, tracking what it reads.
    pub fn execute(&self) {
        self.0.execute();
    }

    /// Re-run the effect now.
    pub fn schedule(&self) {
        self.0.execute();
    }

    /// Dispose of the effect. It will not run again.
    pub fn dispose(&self) {
        if self.0.disposed.replace(true) {
            return;
        }
        self.0.run_cleanups();
        Runtime::clear_dependencies(self.0.subscriber_id);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.0.run_count.get()
    }

    /// Get the number of sources read during the last run.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.0.subscriber_id)
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.0.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{batch, on_cleanup, Signal};

    #[test]
    fn effect_runs_on_creation() {
        let effect = Effect::new(|| {});
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let effect = Effect::new_lazy(|| {});
        assert_eq!(effect.run_count(), 0);

        effect.execute();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let signal = Signal::new(0);
        let seen = Rc::new(Cell::new(-1));

        let (s, out) = (signal.clone(), seen.clone());
        let effect = Effect::new(move || out.set(s.get()));
        assert_eq!(seen.get(), 0);
        assert_eq!(effect.dependency_count(), 1);

        signal.set(42);
        assert_eq!(seen.get(), 42);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_runs_once_per_batch() {
        let a = Signal::new(0);
        let b = Signal::new(0);

        let (ac, bc) = (a.clone(), b.clone());
        let effect = Effect::new(move || {
            ac.get();
            bc.get();
        });

        batch(|| {
            a.set(1);
            b.set(1);
            a.set(2);
        });
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let s = signal.clone();
        let effect = Effect::new(move || {
            s.get();
        });

        effect.dispose();
        effect.dispose();
        assert!(effect.is_disposed());

        signal.set(1);
        effect.schedule();
        assert_eq!(effect.run_count(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn cleanups_run_before_each_rerun() {
        let signal = Signal::new(0);
        let cleaned = Rc::new(Cell::new(0));

        let (s, c) = (signal.clone(), cleaned.clone());
        let effect = Effect::new(move || {
            s.get();
            let c = c.clone();
            on_cleanup(move || c.set(c.get() + 1));
        });
        assert_eq!(cleaned.get(), 0);

        signal.set(1);
        assert_eq!(cleaned.get(), 1);

        effect.dispose();
        assert_eq!(cleaned.get(), 2);
    }
}
