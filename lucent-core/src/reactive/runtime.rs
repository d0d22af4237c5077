//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects sources with the
//! memos and effects that read them. It owns the dependency graph and the
//! queue of computations waiting to be brought up to date.
//!
//! # How It Works
//!
//! 1. When a memo or effect is created, it registers with the runtime.
//!
//! 2. When a computation reads a source, the runtime records the edge.
//!
//! 3. When a source changes, the runtime:
//!    a. Finds all dependent memos/effects
//!    b. Marks them dirty and queues them (each at most once)
//!    c. Unless a batch is open, flushes the queue
//!
//! 4. Flushing re-runs effects and recomputes memos that still have readers.
//!    Memos without readers stay dirty until someone reads them.
//!
//! # Threading
//!
//! The runtime is thread-local. Every thread gets an independent graph; no
//! reactive value is shared across threads.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::{error, trace};

use super::context::ReactiveContext;
use super::subscriber::{SourceId, SubscriberId};

/// Upper bound on computations updated in one flush before we assume a cycle.
const MAX_FLUSH_UPDATES: usize = 100_000;

/// A computation that can be notified when its dependencies change.
pub trait Reactive {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// One of the computation's dependencies changed.
    fn mark_dirty(&self);

    /// Bring the computation up to date. Called from the flush loop.
    fn update(&self);

    /// Check if this computation is an effect (eager) or memo (lazy).
    fn is_eager(&self) -> bool;

    /// Register a callback to run before the next re-run and on disposal.
    fn add_cleanup(&self, cleanup: Box<dyn FnOnce()>);
}

/// Handle to a registered computation.
///
/// Dropping this handle unregisters the computation from the runtime.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    /// The subscriber this handle keeps registered.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

#[derive(Default)]
struct RuntimeState {
    /// Weak references so the runtime never keeps a computation alive.
    registry: HashMap<SubscriberId, Weak<dyn Reactive>>,
    /// source -> computations that read it
    subscribers: HashMap<SourceId, IndexSet<SubscriberId>>,
    /// computation -> sources it read during its last run
    dependencies: HashMap<SubscriberId, IndexSet<SourceId>>,
    pending: IndexSet<SubscriberId>,
    batch_depth: usize,
    flushing: bool,
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

fn with_state<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

/// Like `with_state`, but silently skips when the runtime is unavailable.
/// Used from `Drop` impls, which may run during thread teardown.
fn try_with_state(f: impl FnOnce(&mut RuntimeState)) {
    let _ = RUNTIME.try_with(|rt| {
        if let Ok(mut state) = rt.try_borrow_mut() {
            f(&mut state);
        }
    });
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        try_with_state(|rt| rt.batch_depth = rt.batch_depth.saturating_sub(1));
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        try_with_state(|rt| rt.flushing = false);
    }
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register a computation with the runtime.
    ///
    /// Returns a handle that unregisters the computation when dropped.
    pub fn register(subscriber_id: SubscriberId, reactive: Weak<dyn Reactive>) -> ReactiveHandle {
        with_state(|rt| {
            rt.registry.insert(subscriber_id, reactive);
        });
        ReactiveHandle { subscriber_id }
    }

    fn unregister(id: SubscriberId) {
        try_with_state(|rt| {
            rt.registry.remove(&id);
            rt.pending.shift_remove(&id);
            if let Some(sources) = rt.dependencies.remove(&id) {
                for source in sources {
                    if let Some(subs) = rt.subscribers.get_mut(&source) {
                        subs.shift_remove(&id);
                    }
                }
            }
        });
    }

    /// Record that a computation depends on a source.
    pub fn add_dependency(source: SourceId, subscriber: SubscriberId) {
        with_state(|rt| {
            rt.subscribers.entry(source).or_default().insert(subscriber);
            rt.dependencies.entry(subscriber).or_default().insert(source);
        });
    }

    /// Remove all dependencies of a computation.
    ///
    /// Called before re-running a computation to clear stale dependencies.
    pub fn clear_dependencies(subscriber: SubscriberId) {
        try_with_state(|rt| {
            if let Some(sources) = rt.dependencies.remove(&subscriber) {
                for source in sources {
                    if let Some(subs) = rt.subscribers.get_mut(&source) {
                        subs.shift_remove(&subscriber);
                    }
                }
            }
        });
    }

    /// Forget a source that no longer exists.
    pub fn remove_source(source: SourceId) {
        try_with_state(|rt| {
            if let Some(subs) = rt.subscribers.remove(&source) {
                for subscriber in subs {
                    if let Some(deps) = rt.dependencies.get_mut(&subscriber) {
                        deps.shift_remove(&source);
                    }
                }
            }
        });
    }

    /// Number of computations currently reading a source.
    pub fn subscriber_count(source: SourceId) -> usize {
        with_state(|rt| rt.subscribers.get(&source).map_or(0, IndexSet::len))
    }

    /// Number of sources a computation read during its last run.
    pub fn dependency_count(subscriber: SubscriberId) -> usize {
        with_state(|rt| rt.dependencies.get(&subscriber).map_or(0, IndexSet::len))
    }

    /// Notify all subscribers that a source changed.
    ///
    /// This is the core update propagation mechanism.
    pub fn notify_source_change(source: SourceId) {
        let dirty: SmallVec<[Rc<dyn Reactive>; 4]> = with_state(|rt| {
            let Some(subs) = rt.subscribers.get(&source) else {
                return SmallVec::new();
            };
            let ids: SmallVec<[SubscriberId; 4]> = subs.iter().copied().collect();
            let mut dirty = SmallVec::with_capacity(ids.len());
            for id in ids {
                if let Some(reactive) = rt.registry.get(&id).and_then(Weak::upgrade) {
                    rt.pending.insert(id);
                    dirty.push(reactive);
                }
            }
            dirty
        });

        for reactive in &dirty {
            reactive.mark_dirty();
        }
        drop(dirty);

        if !Self::is_batching() {
            Self::flush();
        }
    }

    /// Run `f`, delivering every notification it raises once it returns.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        with_state(|rt| rt.batch_depth += 1);
        let guard = BatchGuard;
        let result = f();
        drop(guard);

        if !Self::is_batching() {
            Self::flush();
        }
        result
    }

    fn flush() {
        let already = with_state(|rt| std::mem::replace(&mut rt.flushing, true));
        if already {
            return;
        }
        let _guard = FlushGuard;

        let mut updates = 0usize;
        loop {
            let next = with_state(|rt| loop {
                let id = rt.pending.shift_remove_index(0)?;
                if let Some(reactive) = rt.registry.get(&id).and_then(Weak::upgrade) {
                    break Some(reactive);
                }
            });
            let Some(reactive) = next else { break };

            updates += 1;
            if updates > MAX_FLUSH_UPDATES {
                error!(updates, "reactive flush did not settle; dropping pending updates");
                with_state(|rt| rt.pending.clear());
                break;
            }
            trace!(subscriber = reactive.subscriber_id().raw(), "updating computation");
            reactive.update();
        }
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if a computation is collecting dependencies.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Check if a batch is open.
    pub fn is_batching() -> bool {
        with_state(|rt| rt.batch_depth > 0)
    }
}

/// Run `f`, coalescing all notifications it raises into one propagation pass.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::batch(f)
}

/// Run `f` without registering any dependency for the current computation.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _frame = ReactiveContext::untracked();
    f()
}
