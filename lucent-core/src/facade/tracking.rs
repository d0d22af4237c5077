//! Per-key dependency tracking.

use std::fmt;

use crate::error::Result;
use crate::object::{
    default_comparator, descriptor_changed, same_object, Comparator, Object, PartialDescriptor,
    PropertyKey, Value,
};
use crate::reactive::batch;

use super::policy::{Identity, Policy};
use super::store::TrackingKey;
use super::Facade;

/// Tracks reads per key and notifies on observable changes.
///
/// Reads of data properties (and of missing keys) track the key's cell.
/// Accessor keys are excluded; their getters track whatever they read.
/// Key enumeration and presence checks track the shape; prototype and
/// extensibility queries track their own structural keys.
///
/// Every notification a single operation raises is delivered in one batch.
pub struct Tracking {
    identity: Identity,
    comparator: Comparator,
}

impl Tracking {
    pub fn new(comparator: Comparator) -> Self {
        Self {
            identity: Identity,
            comparator,
        }
    }
}

impl Default for Tracking {
    fn default() -> Self {
        Self::new(default_comparator())
    }
}

impl fmt::Debug for Tracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracking").finish_non_exhaustive()
    }
}

impl Policy for Tracking {
    fn name(&self) -> &'static str {
        "tracking"
    }

    fn next(&self) -> Option<&dyn Policy> {
        Some(&self.identity)
    }

    fn comparator(&self) -> Comparator {
        self.comparator.clone()
    }

    fn get(&self, facade: &Facade, key: &PropertyKey, receiver: &Object) -> Result<Value> {
        let raw = facade.raw();
        let value = raw.get_with_receiver(key, receiver)?;
        if facade.is_disposed() {
            return Ok(value);
        }
        let is_accessor = raw.find_property(key).is_some_and(|desc| desc.is_accessor());
        if is_accessor {
            facade.store().exclude(key.clone());
        } else {
            facade
                .policy()
                .track(facade, &TrackingKey::Property(key.clone()));
        }
        Ok(value)
    }

    fn set(&self, facade: &Facade, key: &PropertyKey, value: Value, receiver: &Object) -> Result<bool> {
        // The write lands in `define_property` on the receiver, which notifies.
        batch(|| facade.raw().set_with_receiver(key, value, receiver))
    }

    fn define_property(
        &self,
        facade: &Facade,
        key: &PropertyKey,
        desc: PartialDescriptor,
    ) -> Result<bool> {
        batch(|| {
            let raw = facade.raw();
            let prev = raw.get_own_property(key);
            // A rejected length change may still have removed elements.
            let applied = raw.define_property(key, desc)?;
            let next = raw.get_own_property(key);

            if descriptor_changed(prev.as_ref(), next.as_ref(), &*self.comparator) {
                if next.as_ref().is_some_and(|desc| !desc.is_accessor()) {
                    facade.store().clear_exclusion(key);
                }
                let policy = facade.policy();
                policy.notify(facade, &TrackingKey::Property(key.clone()));
                if prev.is_none() {
                    policy.notify(facade, &TrackingKey::Shape);
                }
            }
            Ok(applied)
        })
    }

    fn delete(&self, facade: &Facade, key: &PropertyKey) -> bool {
        batch(|| {
            let raw = facade.raw();
            let was_own = raw.get_own_property(key).is_some();
            if !raw.delete(key) {
                return false;
            }
            if was_own {
                facade.store().clear_exclusion(key);
                let policy = facade.policy();
                policy.notify(facade, &TrackingKey::Property(key.clone()));
                policy.notify(facade, &TrackingKey::Shape);
            }
            true
        })
    }

    fn has(&self, facade: &Facade, key: &PropertyKey) -> bool {
        facade.policy().track(facade, &TrackingKey::Shape);
        facade.raw().has(key)
    }

    fn own_keys(&self, facade: &Facade) -> Vec<PropertyKey> {
        facade.policy().track(facade, &TrackingKey::Shape);
        facade.raw().own_keys()
    }

    fn get_prototype(&self, facade: &Facade) -> Option<Object> {
        facade.policy().track(facade, &TrackingKey::Prototype);
        facade.raw().get_prototype()
    }

    fn set_prototype(&self, facade: &Facade, proto: Option<Object>) -> bool {
        batch(|| {
            let raw = facade.raw();
            let before = raw.get_prototype();
            if !raw.set_prototype(proto) {
                return false;
            }
            if same_object(before.as_ref(), raw.get_prototype().as_ref()) {
                return true;
            }

            let policy = facade.policy();
            policy.notify(facade, &TrackingKey::Prototype);
            policy.notify(facade, &TrackingKey::Shape);
            for key in facade.store().tracked_properties() {
                if raw.get_own_property(&key).is_none() {
                    policy.notify(facade, &TrackingKey::Property(key));
                }
            }
            true
        })
    }

    fn is_extensible(&self, facade: &Facade) -> bool {
        facade.policy().track(facade, &TrackingKey::Extensible);
        facade.raw().is_extensible()
    }

    fn prevent_extensions(&self, facade: &Facade) -> bool {
        let raw = facade.raw();
        let was_extensible = raw.is_extensible();
        let done = raw.prevent_extensions();
        if done && was_extensible {
            facade.policy().notify(facade, &TrackingKey::Extensible);
        }
        done
    }
}
