//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a source is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a memo or effect), we push
//! the computation onto the stack. When the computation completes, we pop it.
//!
//! A frame may also be *untracked*: reads inside it register nothing even if
//! an outer computation is running. Scopes and `untrack` push such frames.

use std::cell::RefCell;
use std::rc::Rc;

use super::runtime::{Reactive, Runtime};
use super::{SourceId, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The running computation, or `None` for an untracked frame.
    observer: Option<Rc<dyn Reactive>>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given computation.
    ///
    /// While this context is active, any source that is read will register
    /// the computation as a dependent.
    pub fn enter(observer: Rc<dyn Reactive>) -> Self {
        let subscriber_id = Some(observer.subscriber_id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                observer: Some(observer),
            });
        });
        Self { subscriber_id }
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry { observer: None });
        });
        Self {
            subscriber_id: None,
        }
    }

    /// Check if a computation is collecting dependencies right now.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.observer.is_some())
                .unwrap_or(false)
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.observer.as_ref().map(|o| o.subscriber_id()))
        })
    }

    /// The running computation, if any.
    pub(crate) fn current() -> Option<Rc<dyn Reactive>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.observer.clone())
        })
    }

    /// Record a dependency of the current computation on the given source.
    pub fn track_dependency(source: SourceId) {
        if let Some(subscriber) = Self::current_subscriber() {
            Runtime::add_dependency(source, subscriber);
        }
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Catch mismatched guards early.
        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.observer.as_ref().map(|o| o.subscriber_id()),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }
        drop(popped);
    }
}
