//! The policy chain.
//!
//! A facade routes every object operation through its policy. Policies are
//! layered: each one wraps the next and overrides only the operations it
//! cares about, and every default forwards to the next layer or, at the
//! bottom, to the raw object.
//!
//! Hooks that a layer raises on its own behalf (`track`, `notify`) go through
//! `facade.policy()`, the outermost layer, so that outer layers see them.

use crate::error::Result;
use crate::object::{
    default_comparator, Comparator, Mutation, Object, PartialDescriptor, PropertyDescriptor,
    PropertyKey, Value,
};
use crate::reactive::Scope;

use super::store::TrackingKey;
use super::Facade;

pub trait Policy {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// The layer this one wraps.
    fn next(&self) -> Option<&dyn Policy> {
        None
    }

    /// Called once, right after the facade is attached.
    fn init(&self, facade: &Facade) {
        if let Some(next) = self.next() {
            next.init(facade);
        }
    }

    /// Called once, when the facade is disposed.
    fn dispose(&self, facade: &Facade) {
        if let Some(next) = self.next() {
            next.dispose(facade);
        }
    }

    /// Equality used to decide whether a write is observable.
    fn comparator(&self) -> Comparator {
        self.next()
            .map_or_else(default_comparator, |next| next.comparator())
    }

    /// The facade's ownership scope, if a layer keeps one.
    fn owner(&self, facade: &Facade) -> Option<Scope> {
        self.next().and_then(|next| next.owner(facade))
    }

    fn get(&self, facade: &Facade, key: &PropertyKey, receiver: &Object) -> Result<Value> {
        match self.next() {
            Some(next) => next.get(facade, key, receiver),
            None => facade.raw().get_with_receiver(key, receiver),
        }
    }

    fn set(&self, facade: &Facade, key: &PropertyKey, value: Value, receiver: &Object) -> Result<bool> {
        match self.next() {
            Some(next) => next.set(facade, key, value, receiver),
            None => facade.raw().set_with_receiver(key, value, receiver),
        }
    }

    fn get_own_property(&self, facade: &Facade, key: &PropertyKey) -> Option<PropertyDescriptor> {
        match self.next() {
            Some(next) => next.get_own_property(facade, key),
            None => facade.raw().get_own_property(key),
        }
    }

    fn define_property(
        &self,
        facade: &Facade,
        key: &PropertyKey,
        desc: PartialDescriptor,
    ) -> Result<bool> {
        match self.next() {
            Some(next) => next.define_property(facade, key, desc),
            None => facade.raw().define_property(key, desc),
        }
    }

    fn delete(&self, facade: &Facade, key: &PropertyKey) -> bool {
        match self.next() {
            Some(next) => next.delete(facade, key),
            None => facade.raw().delete(key),
        }
    }

    fn has(&self, facade: &Facade, key: &PropertyKey) -> bool {
        match self.next() {
            Some(next) => next.has(facade, key),
            None => facade.raw().has(key),
        }
    }

    fn own_keys(&self, facade: &Facade) -> Vec<PropertyKey> {
        match self.next() {
            Some(next) => next.own_keys(facade),
            None => facade.raw().own_keys(),
        }
    }

    fn get_prototype(&self, facade: &Facade) -> Option<Object> {
        match self.next() {
            Some(next) => next.get_prototype(facade),
            None => facade.raw().get_prototype(),
        }
    }

    fn set_prototype(&self, facade: &Facade, proto: Option<Object>) -> bool {
        match self.next() {
            Some(next) => next.set_prototype(facade, proto),
            None => facade.raw().set_prototype(proto),
        }
    }

    fn is_extensible(&self, facade: &Facade) -> bool {
        match self.next() {
            Some(next) => next.is_extensible(facade),
            None => facade.raw().is_extensible(),
        }
    }

    fn prevent_extensions(&self, facade: &Facade) -> bool {
        match self.next() {
            Some(next) => next.prevent_extensions(facade),
            None => facade.raw().prevent_extensions(),
        }
    }

    /// Register a dependency of the running computation.
    fn track(&self, facade: &Facade, key: &TrackingKey) {
        match self.next() {
            Some(next) => next.track(facade, key),
            None if facade.is_disposed() => {}
            None => facade.store().track(key.clone()),
        }
    }

    /// Invalidate the dependents of `key`.
    fn notify(&self, facade: &Facade, key: &TrackingKey) {
        match self.next() {
            Some(next) => next.notify(facade, key),
            None if facade.is_disposed() => {}
            None => facade.store().notify(key),
        }
    }

    /// Run a multi-step collection operation.
    fn mutate(
        &self,
        facade: &Facade,
        op: Mutation,
        run: &mut dyn FnMut() -> Result<()>,
    ) -> Result<()> {
        match self.next() {
            Some(next) => next.mutate(facade, op, run),
            None => run(),
        }
    }
}

/// The bottom layer: plain forwarding, no observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Policy for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }
}
