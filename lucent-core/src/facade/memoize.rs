//! Getter memoization.
//!
//! A getter read through the facade itself is evaluated inside a [`Memo`]
//! owned by the facade's scope, so it runs at most once per invalidation of
//! whatever it reads. Readers also track the key's own cell, which keeps data
//! properties and accessors on the same dependency path.
//!
//! A getter that reads itself before producing its first value would recurse
//! forever. Each entry carries an in-progress flag; a read that finds the flag
//! set dispatches to [`OnCircular`] instead of evaluating again.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::error::{Result, StoreError};
use crate::object::{same_object, Comparator, Getter, Object, PropertyKey, Value};
use crate::reactive::{batch, Memo, Scope};

use super::lifecycle::Lifecycle;
use super::policy::Policy;
use super::store::TrackingKey;
use super::Facade;

/// What a getter that reads itself gets back.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OnCircular {
    /// Fail with [`StoreError::CircularGetter`].
    #[default]
    Fail,
    /// Return this value in place of the unfinished result.
    Return(Value),
}

#[derive(Clone)]
struct MemoEntry {
    memo: Memo<Result<Value>>,
    /// Owns the memo; disposing it releases the memo and unlinks it from the facade scope.
    scope: Scope,
    evaluating: Rc<Cell<bool>>,
}

#[derive(Clone)]
enum MemoSlot {
    /// Not a getter when last classified.
    Ineligible,
    Getter(MemoEntry),
}

/// Per-facade memo entries, separate from the dependency store.
#[derive(Default)]
pub(crate) struct MemoCache {
    slots: RefCell<HashMap<PropertyKey, MemoSlot>>,
}

impl MemoCache {
    fn slot(&self, key: &PropertyKey) -> Option<MemoSlot> {
        self.slots.borrow().get(key).cloned()
    }

    fn insert(&self, key: PropertyKey, slot: MemoSlot) {
        self.slots.borrow_mut().insert(key, slot);
    }

    /// Drop the entry for `key` and dispose its memo.
    pub(crate) fn evict(&self, key: &PropertyKey) {
        let removed = self.slots.borrow_mut().remove(key);
        if let Some(MemoSlot::Getter(entry)) = removed {
            trace!(%key, "evicted memo");
            entry.scope.dispose();
        }
    }

    /// Evict `key` only if it still holds `entry`.
    fn evict_entry(&self, key: &PropertyKey, entry: &MemoEntry) {
        let current = matches!(
            self.slots.borrow().get(key),
            Some(MemoSlot::Getter(e)) if e.memo.ptr_eq(&entry.memo)
        );
        if current {
            self.evict(key);
        }
    }

    fn keys(&self) -> Vec<PropertyKey> {
        self.slots.borrow().keys().cloned().collect()
    }

    pub(crate) fn clear(&self) {
        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        for slot in slots.into_values() {
            if let MemoSlot::Getter(entry) = slot {
                entry.scope.dispose();
            }
        }
    }

    /// Number of live getter memos.
    pub(crate) fn len(&self) -> usize {
        self.slots
            .borrow()
            .values()
            .filter(|slot| matches!(slot, MemoSlot::Getter(_)))
            .count()
    }
}

struct Evaluating(Rc<Cell<bool>>);

impl Evaluating {
    fn enter(flag: &Rc<Cell<bool>>) -> Self {
        flag.set(true);
        Self(flag.clone())
    }
}

impl Drop for Evaluating {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Caches getter results per facade.
#[derive(Default)]
pub struct Memoizing {
    inner: Lifecycle,
    on_circular: OnCircular,
}

impl Memoizing {
    pub fn new(inner: Lifecycle, on_circular: OnCircular) -> Self {
        Self { inner, on_circular }
    }

    fn circular(&self, key: &PropertyKey) -> Result<Value> {
        match &self.on_circular {
            OnCircular::Fail => {
                warn!(%key, "getter read itself before its first value");
                Err(StoreError::CircularGetter { key: key.clone() })
            }
            OnCircular::Return(fallback) => {
                warn!(%key, "getter read itself before its first value, using fallback");
                Ok(fallback.clone())
            }
        }
    }

    fn create(&self, facade: &Facade, key: &PropertyKey, getter: Getter) -> MemoEntry {
        let evaluating = Rc::new(Cell::new(false));
        let flag = evaluating.clone();
        let weak = facade.downgrade();
        let compute = move || -> Result<Value> {
            let facade = weak.upgrade().ok_or(StoreError::NotAttached)?;
            let _evaluating = Evaluating::enter(&flag);
            getter(facade.as_object())
        };

        let comparator: Comparator = self.comparator();
        let equals = move |a: &Result<Value>, b: &Result<Value>| match (a, b) {
            (Ok(a), Ok(b)) => comparator(a, b),
            _ => false,
        };

        let scope = self
            .owner(facade)
            .map_or_else(Scope::new, |owner| owner.child());
        let memo = scope.run(|| Memo::with_equals(compute, equals));
        trace!(%key, "created memo");

        let entry = MemoEntry {
            memo,
            scope,
            evaluating,
        };
        facade
            .memos()
            .insert(key.clone(), MemoSlot::Getter(entry.clone()));
        entry
    }
}

impl fmt::Debug for Memoizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoizing")
            .field("on_circular", &self.on_circular)
            .finish_non_exhaustive()
    }
}

impl Policy for Memoizing {
    fn name(&self) -> &'static str {
        "memoized"
    }

    fn next(&self) -> Option<&dyn Policy> {
        Some(&self.inner)
    }

    fn dispose(&self, facade: &Facade) {
        facade.memos().clear();
        self.inner.dispose(facade);
    }

    fn get(&self, facade: &Facade, key: &PropertyKey, receiver: &Object) -> Result<Value> {
        if !Object::ptr_eq(receiver, facade.as_object()) || facade.is_disposed() {
            return self.inner.get(facade, key, receiver);
        }

        let entry = match facade.memos().slot(key) {
            Some(MemoSlot::Getter(entry)) => entry,
            Some(MemoSlot::Ineligible) => return self.inner.get(facade, key, receiver),
            None => match facade.raw().find_property(key).and_then(|d| d.getter().cloned()) {
                Some(getter) => self.create(facade, key, getter),
                None => {
                    facade.memos().insert(key.clone(), MemoSlot::Ineligible);
                    return self.inner.get(facade, key, receiver);
                }
            },
        };

        if entry.evaluating.get() {
            return match entry.memo.get_untracked() {
                Some(previous) => previous,
                None => self.circular(key),
            };
        }

        facade
            .store()
            .track_forced(TrackingKey::Property(key.clone()));
        let result = entry.memo.try_get().unwrap_or_else(|| self.circular(key));
        if result.is_err() {
            facade.memos().evict_entry(key, &entry);
        }
        result
    }

    fn notify(&self, facade: &Facade, key: &TrackingKey) {
        if let TrackingKey::Property(key) = key {
            facade.memos().evict(key);
        }
        self.inner.notify(facade, key);
    }

    fn set_prototype(&self, facade: &Facade, proto: Option<Object>) -> bool {
        batch(|| {
            let raw = facade.raw();
            let before = raw.get_prototype();
            if !self.inner.set_prototype(facade, proto) {
                return false;
            }
            if !same_object(before.as_ref(), raw.get_prototype().as_ref()) {
                // Inherited getters may have changed even where nobody tracks them.
                for key in facade.memos().keys() {
                    if raw.get_own_property(&key).is_none() {
                        facade.memos().evict(&key);
                    }
                }
            }
            true
        })
    }

    fn owner(&self, facade: &Facade) -> Option<Scope> {
        self.inner.owner(facade)
    }
}
