//! Observable Facades
//!
//! A facade stands in for a raw object. Reads through it register
//! dependencies with the running computation; writes, deletes and structural
//! changes through it invalidate exactly the computations that read what
//! changed. The raw object stays the single source of truth: a facade never
//! answers with a value the raw object would not.
//!
//! # Layers
//!
//! Behavior comes from a chain of [`Policy`] layers, innermost first:
//!
//! - [`Identity`]: forwards everything to the raw object
//! - [`Tracking`]: per-key cells in a [`DependencyStore`]
//! - [`Lifecycle`]: an ownership [`Scope`] per facade
//! - [`Memoizing`]: getters cached as memos under that scope
//! - [`Collection`]: an aggregate cell and batched bulk operations for arrays
//!
//! # Example
//!
//! ```rust,ignore
//! let raw = Object::from_entries([("count", 0)]);
//! let state = wrap(&raw, None);
//!
//! let effect = Effect::new({
//!     let state = state.clone();
//!     move || println!("count = {:?}", state.get("count"))
//! });
//!
//! state.put("count", 1)?; // prints "count = Ok(1)"
//! ```

mod attach;
mod collection;
mod lifecycle;
mod memoize;
mod policy;
mod store;
mod tracking;

use std::cell::{Cell, OnceCell};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::config::StoreConfig;
use crate::object::{Object, ObjectKind};
use crate::reactive::Scope;

pub use attach::{attach, get_facade, get_raw, is_attached};
pub use collection::Collection;
pub use lifecycle::Lifecycle;
pub use memoize::{Memoizing, OnCircular};
pub use policy::{Identity, Policy};
pub use store::{DependencyStore, Forcer, TrackingKey};
pub use tracking::Tracking;

pub(crate) use memoize::MemoCache;

pub(crate) struct FacadeInner {
    pub(crate) raw: Object,
    pub(crate) policy: Rc<dyn Policy>,
    store: DependencyStore,
    memos: MemoCache,
    owner: OnceCell<Scope>,
    disposed: Cell<bool>,
}

/// An observable stand-in for a raw object.
///
/// Derefs to [`Object`], so every object operation is available directly.
#[derive(Clone)]
pub struct Facade {
    object: Object,
    inner: Rc<FacadeInner>,
}

impl Facade {
    pub(crate) fn from_parts(object: Object, inner: Rc<FacadeInner>) -> Self {
        Self { object, inner }
    }

    pub fn as_object(&self) -> &Object {
        &self.object
    }

    pub fn raw(&self) -> &Object {
        &self.inner.raw
    }

    /// The outermost policy layer.
    pub fn policy(&self) -> &dyn Policy {
        &*self.inner.policy
    }

    pub fn store(&self) -> &DependencyStore {
        &self.inner.store
    }

    pub(crate) fn memos(&self) -> &MemoCache {
        &self.inner.memos
    }

    pub(crate) fn owner_slot(&self) -> &OnceCell<Scope> {
        &self.inner.owner
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Depend on any change to this collection's elements or length.
    pub fn track_items(&self) {
        self.policy().track(self, &TrackingKey::Items);
    }

    pub(crate) fn downgrade(&self) -> WeakFacade {
        WeakFacade(Rc::downgrade(&self.object.0))
    }
}

/// A non-owning facade handle.
#[derive(Clone)]
pub(crate) struct WeakFacade(Weak<ObjectKind>);

impl WeakFacade {
    pub(crate) fn upgrade(&self) -> Option<Facade> {
        self.0.upgrade().and_then(|kind| Object(kind).as_facade())
    }
}

impl Deref for Facade {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.object
    }
}

impl AsRef<Object> for Facade {
    fn as_ref(&self) -> &Object {
        &self.object
    }
}

impl From<Facade> for Object {
    fn from(facade: Facade) -> Self {
        facade.object
    }
}

impl From<&Facade> for crate::object::Value {
    fn from(facade: &Facade) -> Self {
        crate::object::Value::Object(facade.object.clone())
    }
}

/// Facades compare by identity.
impl PartialEq for Facade {
    fn eq(&self, other: &Self) -> bool {
        Object::ptr_eq(&self.object, &other.object)
    }
}

impl Eq for Facade {}

impl fmt::Debug for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facade")
            .field("policy", &self.policy().name())
            .field("raw", self.raw())
            .field("store", self.store())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Wrap `raw` in a facade.
///
/// Idempotent: a facade wraps to itself and an attached raw object returns its
/// existing facade (whatever its policy). The default policy is [`Tracking`].
pub fn wrap(raw: &Object, policy: Option<Rc<dyn Policy>>) -> Facade {
    if let Some(facade) = raw.as_facade() {
        return facade;
    }
    if let Some(existing) = is_attached(raw) {
        return existing;
    }

    let policy = policy.unwrap_or_else(|| Rc::new(Tracking::default()));
    let inner = Rc::new(FacadeInner {
        raw: raw.clone(),
        policy,
        store: DependencyStore::new(),
        memos: MemoCache::default(),
        owner: OnceCell::new(),
        disposed: Cell::new(false),
    });
    let object = Object(Rc::new(ObjectKind::Facade(inner.clone())));
    let facade = Facade { object, inner };

    attach(raw, Some(&facade));
    facade.policy().init(&facade);
    debug!(policy = facade.policy().name(), "wrapped object");
    facade
}

/// Wrap `raw` with the policy stack described by `config`.
pub fn wrap_with(raw: &Object, config: &StoreConfig) -> Facade {
    wrap(raw, Some(config.build()))
}

/// Whether `object` is a facade.
pub fn is_wrapped(object: &Object) -> bool {
    object.is_facade()
}

/// Tear a facade down and detach it from its raw object. Idempotent.
///
/// Afterwards `wrap` on the raw object creates a fresh facade.
pub fn dispose(facade: &Facade) {
    if facade.inner.disposed.replace(true) {
        return;
    }
    facade.policy().dispose(facade);
    facade.store().clear();

    let raw = facade.raw();
    if is_attached(raw).is_some_and(|current| current == *facade) {
        attach(raw, None);
    }
    debug!(policy = facade.policy().name(), "disposed facade");
}

/// The facade's dependency store.
pub fn get_store(facade: &Facade) -> DependencyStore {
    facade.store().clone()
}

/// The facade's ownership scope, if its policy keeps one.
pub fn get_owner(facade: &Facade) -> Option<Scope> {
    facade.policy().owner(facade)
}
