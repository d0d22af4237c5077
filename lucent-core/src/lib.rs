//! Lucent Core
//!
//! This crate makes ordinary objects transparently observable. A raw object is
//! wrapped in a facade; reads through the facade register dependencies with
//! the running reactive computation, and writes, deletes and structural
//! changes through it invalidate exactly the computations that depend on them.
//!
//! It implements:
//!
//! - Reactive primitives (signals, triggers, memos, effects, scopes, batching)
//! - A dynamic object model with descriptors, prototypes and arrays
//! - Facades with layered policies: tracking, ownership, getter memoization
//!   and collection-wide observation
//! - Atoms, engine-agnostic reactive values
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `object`: Values, property keys, descriptors and object semantics
//! - `facade`: Attachment, dependency store and the policy chain
//! - `atom`: Read/write value pairs
//! - `config`: Serde-backed policy selection
//!
//! # Example
//!
//! ```rust,ignore
//! use lucent_core::{wrap, Effect, Object};
//!
//! let raw = Object::from_entries([("count", 0)]);
//! let state = wrap(&raw, None);
//!
//! let reader = state.clone();
//! Effect::new(move || {
//!     println!("Count: {:?}", reader.get("count"));
//! });
//!
//! state.put("count", 5)?;
//! // Effect automatically runs, prints: "Count: Ok(5)"
//! ```

pub mod atom;
pub mod config;
pub mod error;
pub mod facade;
pub mod object;
pub mod reactive;

pub use atom::{Atom, AtomLike, ReadOnlyAtom};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use facade::{
    dispose, get_facade, get_owner, get_raw, get_store, is_wrapped, wrap, wrap_with, Facade,
    OnCircular, Policy,
};
pub use object::{Object, PartialDescriptor, PropertyKey, Value};
pub use reactive::{batch, untrack, Effect, Memo, Scope, Signal};
