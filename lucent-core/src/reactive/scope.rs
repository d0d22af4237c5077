//! Ownership scopes.
//!
//! A scope owns cleanups and the computations created while it is current.
//! Disposing a scope disposes its children first, then runs its cleanups.
//! Disposal is idempotent and also happens when the last handle is dropped.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::context::ReactiveContext;

thread_local! {
    static CURRENT_SCOPE: RefCell<Option<Weak<ScopeInner>>> = const { RefCell::new(None) };
}

struct ScopeInner {
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    children: RefCell<Vec<Scope>>,
    parent: Weak<ScopeInner>,
    disposed: Cell<bool>,
}

impl ScopeInner {
    fn new(parent: Weak<ScopeInner>) -> Self {
        Self {
            cleanups: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            parent,
            disposed: Cell::new(false),
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        // A child disposed on its own no longer counts against its parent.
        if let Some(parent) = self.parent.upgrade() {
            parent
                .children
                .borrow_mut()
                .retain(|child| !std::ptr::eq(Rc::as_ptr(&child.inner), self));
        }

        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.dispose();
        }

        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A lifecycle boundary that owns cleanups and derived computations.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

struct ScopeGuard {
    previous: Option<Weak<ScopeInner>>,
    _frame: ReactiveContext,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = CURRENT_SCOPE.try_with(|current| *current.borrow_mut() = previous);
    }
}

impl Scope {
    /// Create a detached root scope.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner::new(Weak::new())),
        }
    }

    /// Create a scope disposed together with this one.
    ///
    /// Disposing the child first detaches it from this scope.
    pub fn child(&self) -> Scope {
        let child = Scope {
            inner: Rc::new(ScopeInner::new(Rc::downgrade(&self.inner))),
        };
        if self.is_disposed() {
            child.dispose();
        } else {
            self.inner.children.borrow_mut().push(child.clone());
        }
        child
    }

    /// Run `f` with this scope current.
    ///
    /// Reads inside `f` are untracked, and computations created inside `f`
    /// belong to this scope rather than to whatever computation is running.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = CURRENT_SCOPE.with(|current| {
            current
                .borrow_mut()
                .replace(Rc::downgrade(&self.inner))
        });
        let _guard = ScopeGuard {
            previous,
            _frame: ReactiveContext::untracked(),
        };
        f()
    }

    /// Register a cleanup. Runs immediately if the scope is already disposed.
    pub fn add_cleanup(&self, cleanup: impl FnOnce() + 'static) {
        if self.is_disposed() {
            cleanup();
        } else {
            self.inner.cleanups.borrow_mut().push(Box::new(cleanup));
        }
    }

    /// Tear the scope down: children first, then cleanups. Idempotent.
    pub fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        debug!("disposing scope");
        self.inner.dispose();
    }

    /// Check if the scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of pending cleanups.
    pub fn cleanup_count(&self) -> usize {
        self.inner.cleanups.borrow().len()
    }

    /// Number of live child scopes.
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Check if two handles refer to the same scope.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("cleanups", &self.inner.cleanups.borrow().len())
            .field("children", &self.inner.children.borrow().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// The scope made current by the innermost `Scope::run`, if any.
pub fn current_scope() -> Option<Scope> {
    CURRENT_SCOPE.with(|current| {
        current
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Scope { inner })
    })
}

/// Register a cleanup with the running computation, or else the current scope.
///
/// Computation cleanups run before the computation re-runs and when it is
/// disposed. Outside of both, the cleanup is dropped without running.
pub fn on_cleanup(cleanup: impl FnOnce() + 'static) {
    if let Some(observer) = ReactiveContext::current() {
        observer.add_cleanup(Box::new(cleanup));
    } else if let Some(scope) = current_scope() {
        scope.add_cleanup(cleanup);
    } else {
        trace!("cleanup registered outside any computation or scope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Signal};

    #[test]
    fn dispose_runs_cleanups_once() {
        let scope = Scope::new();
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        scope.add_cleanup(move || r.set(r.get() + 1));

        scope.dispose();
        scope.dispose();
        assert_eq!(runs.get(), 1);
        assert!(scope.is_disposed());
    }

    #[test]
    fn children_are_disposed_with_parent() {
        let parent = Scope::new();
        let child = parent.child();
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        child.add_cleanup(move || r.set(r.get() + 1));

        parent.dispose();
        assert!(child.is_disposed());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn run_sets_and_restores_current_scope() {
        let scope = Scope::new();
        assert!(current_scope().is_none());

        let inside = scope.run(current_scope);
        assert!(inside.is_some_and(|s| s.ptr_eq(&scope)));
        assert!(current_scope().is_none());
    }

    #[test]
    fn effects_created_in_scope_are_disposed_with_it() {
        let scope = Scope::new();
        let signal = Signal::new(0);

        let s = signal.clone();
        let effect = scope.run(|| Effect::new(move || {
            s.get();
        }));

        scope.dispose();
        assert!(effect.is_disposed());
        signal.set(1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn disposed_child_leaves_parent() {
        let parent = Scope::new();
        let first = parent.child();
        let _second = parent.child();
        assert_eq!(parent.child_count(), 2);

        first.dispose();
        assert_eq!(parent.child_count(), 1);
        assert!(!parent.is_disposed());
    }

    #[test]
    fn cleanup_after_dispose_runs_immediately() {
        let scope = Scope::new();
        scope.dispose();

        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        scope.add_cleanup(move || r.set(true));
        assert!(ran.get());
    }

    #[test]
    fn dropping_last_handle_disposes() {
        let ran = Rc::new(Cell::new(false));
        {
            let scope = Scope::new();
            let r = ran.clone();
            scope.add_cleanup(move || r.set(true));
        }
        assert!(ran.get());
    }
}
