//! Reactive Primitives
//!
//! This module implements the reactive engine the observable-object layer is
//! built on: value cells, derived computations, effects, ownership scopes and
//! batching.
//!
//! # Concepts
//!
//! ## Signals and Triggers
//!
//! A Signal is a container for mutable state; a Trigger is the same thing
//! without a value. Reading either inside a tracking context (a memo or
//! effect) registers that context as a dependent. Changing it notifies all
//! dependents.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes, and wakes its own readers only when the
//! result is different.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! ## Scopes and batches
//!
//! A Scope owns computations and cleanups and tears them down as a unit.
//! `batch` defers delivery of notifications until the closure returns, so
//! dependents run once and never observe an intermediate state.
//!
//! # Implementation Notes
//!
//! The engine uses a thread-local tracking context to detect dependencies
//! automatically and a thread-local runtime holding the dependency graph.

mod context;
mod effect;
mod memo;
mod runtime;
mod scope;
mod signal;
mod subscriber;
mod trigger;

pub use context::ReactiveContext;
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use runtime::{batch, untrack, Reactive, ReactiveHandle, Runtime};
pub use scope::{current_scope, on_cleanup, Scope};
pub use signal::Signal;
pub use subscriber::{SourceId, SubscriberId};
pub use trigger::Trigger;
