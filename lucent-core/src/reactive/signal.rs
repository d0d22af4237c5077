//! Signal Implementation
//!
//! A Signal is the fundamental value-carrying reactive cell. It holds a value
//! and tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes (according to its equality function),
//!    all subscribers are notified.
//!
//! 3. Notifications trigger re-execution of dependent computations.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::trigger::Trigger;
use super::SourceId;

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
pub struct Signal<T: 'static> {
    trigger: Trigger,
    value: Rc<RefCell<T>>,
    equals: Rc<dyn Fn(&T, &T) -> bool>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal compared with `PartialEq`.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_equals(value, |a, b| a == b)
    }

    /// Create a new signal with a custom equality function.
    ///
    /// A write only notifies subscribers when `equals(old, new)` is false.
    pub fn with_equals(value: T, equals: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self {
            trigger: Trigger::new(),
            value: Rc::new(RefCell::new(value)),
            equals: Rc::new(equals),
        }
    }

    /// Get the signal's source ID.
    pub fn id(&self) -> SourceId {
        self.trigger.id()
    }

    /// Get the current value, tracking it in the running computation.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.trigger.track();
        self.value.borrow().clone()
    }

    /// Borrow the current value, tracking it in the running computation.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.trigger.track();
        f(&*self.value.borrow())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    /// Set a new value and notify subscribers if it differs.
    pub fn set(&self, value: T) {
        let changed = !(self.equals)(&*self.value.borrow(), &value);
        *self.value.borrow_mut() = value;
        if changed {
            self.trigger.notify();
        }
    }

    /// Mutate the value in place and notify subscribers.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        f(&mut *self.value.borrow_mut());
        self.trigger.notify();
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.trigger.subscriber_count()
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            trigger: self.trigger.clone(),
            value: Rc::clone(&self.value),
            equals: Rc::clone(&self.equals),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &*self.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::cell::Cell;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| *v += 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_notifies_only_on_change() {
        let signal = Signal::new(0);
        let runs = Rc::new(Cell::new(0));

        let (s, r) = (signal.clone(), runs.clone());
        let _effect = Effect::new(move || {
            s.get();
            r.set(r.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        signal.set(1);
        assert_eq!(runs.get(), 2);

        signal.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn custom_equality_always_notifies() {
        let signal = Signal::with_equals(5, |_, _| false);
        let runs = Rc::new(Cell::new(0));

        let (s, r) = (signal.clone(), runs.clone());
        let _effect = Effect::new(move || {
            s.get();
            r.set(r.get() + 1);
        });

        signal.set(5);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);
        assert_eq!(signal1.id(), signal2.id());
    }
}
