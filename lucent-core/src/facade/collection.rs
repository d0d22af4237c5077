//! Ordered collections.
//!
//! Arrays get an aggregate `Items` cell next to their per-index cells. Every
//! index or length notification also notifies `Items`, and bulk operations
//! run in one batch so readers never see a half-applied splice or sort.

use crate::error::Result;
use crate::object::{Mutation, PartialDescriptor, PropertyKey};
use crate::reactive::{batch, Scope};

use super::memoize::Memoizing;
use super::policy::Policy;
use super::store::TrackingKey;
use super::Facade;

/// Adds collection-wide observation to [`Memoizing`].
///
/// Non-array objects pass through unchanged.
#[derive(Debug, Default)]
pub struct Collection {
    inner: Memoizing,
}

impl Collection {
    pub fn new(inner: Memoizing) -> Self {
        Self { inner }
    }
}

fn raw_length(facade: &Facade) -> u32 {
    facade
        .raw()
        .as_plain()
        .map_or(0, |plain| plain.length_slot().0)
}

fn is_item_key(key: &PropertyKey) -> bool {
    key.as_index().is_some() || key.is_length()
}

impl Policy for Collection {
    fn name(&self) -> &'static str {
        "collection"
    }

    fn next(&self) -> Option<&dyn Policy> {
        Some(&self.inner)
    }

    fn notify(&self, facade: &Facade, key: &TrackingKey) {
        batch(|| {
            self.inner.notify(facade, key);
            if let TrackingKey::Property(key) = key {
                if is_item_key(key) && facade.raw().is_array() {
                    self.inner.notify(facade, &TrackingKey::Items);
                }
            }
        });
    }

    fn own_keys(&self, facade: &Facade) -> Vec<PropertyKey> {
        if facade.raw().is_array() {
            self.track(facade, &TrackingKey::Items);
        }
        self.inner.own_keys(facade)
    }

    fn define_property(
        &self,
        facade: &Facade,
        key: &PropertyKey,
        desc: PartialDescriptor,
    ) -> Result<bool> {
        if !facade.raw().is_array() {
            return self.inner.define_property(facade, key, desc);
        }
        batch(|| {
            let before = raw_length(facade);
            let applied = self.inner.define_property(facade, key, desc);
            let after = raw_length(facade);

            if after != before && !key.is_length() {
                self.notify(facade, &TrackingKey::Property(PropertyKey::length()));
            }
            if after < before {
                // Truncation drops elements without passing through `delete`.
                self.notify(facade, &TrackingKey::Shape);
                for tracked in facade.store().tracked_properties() {
                    if tracked.as_index().is_some_and(|i| i >= after) {
                        self.notify(facade, &TrackingKey::Property(tracked));
                    }
                }
            }
            applied
        })
    }

    fn mutate(
        &self,
        facade: &Facade,
        op: Mutation,
        run: &mut dyn FnMut() -> Result<()>,
    ) -> Result<()> {
        batch(|| {
            let result = self.inner.mutate(facade, op, run);
            if op.resizes() {
                self.notify(facade, &TrackingKey::Property(PropertyKey::length()));
            }
            result
        })
    }

    fn owner(&self, facade: &Facade) -> Option<Scope> {
        self.inner.owner(facade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::wrap;
    use crate::object::{Object, Value};
    use crate::reactive::Effect;
    use std::rc::Rc;

    fn collection(values: &[i32]) -> Facade {
        let raw = Object::from_values(values.iter().copied());
        wrap(&raw, Some(Rc::new(Collection::default())))
    }

    fn items_reader(facade: &Facade) -> Effect {
        let facade = facade.clone();
        Effect::new(move || facade.track_items())
    }

    #[test]
    fn splice_notifies_once() {
        let arr = collection(&[1, 2, 3, 4]);
        let items = items_reader(&arr);

        arr.splice(0, Some(3), ["a", "b", "c"]).unwrap();
        assert_eq!(items.run_count(), 2);
        assert_eq!(
            arr.to_vec().unwrap(),
            [Value::from("a"), Value::from("b"), Value::from("c"), Value::from(4)]
        );
        assert_eq!(arr.len().unwrap(), 4);
    }

    #[test]
    fn index_write_notifies_items() {
        let arr = collection(&[1, 2]);
        let items = items_reader(&arr);
        arr.put(0u32, 5).unwrap();
        assert_eq!(items.run_count(), 2);
        arr.put(0u32, 5).unwrap();
        assert_eq!(items.run_count(), 2);
    }

    #[test]
    fn named_properties_leave_items_alone() {
        let arr = collection(&[1]);
        let items = items_reader(&arr);
        arr.put("label", "numbers").unwrap();
        assert_eq!(items.run_count(), 1);
    }

    #[test]
    fn growing_by_index_notifies_length() {
        let arr = collection(&[1]);
        let length = {
            let arr = arr.clone();
            Effect::new(move || {
                let _ = arr.len();
            })
        };
        arr.put(3u32, 9).unwrap();
        assert_eq!(length.run_count(), 2);
        assert_eq!(arr.len().unwrap(), 4);
    }

    #[test]
    fn truncation_notifies_removed_indices() {
        let arr = collection(&[1, 2, 3]);
        let last = {
            let arr = arr.clone();
            Effect::new(move || {
                let _ = arr.get(2u32);
            })
        };
        let first = {
            let arr = arr.clone();
            Effect::new(move || {
                let _ = arr.get(0u32);
            })
        };

        arr.put(PropertyKey::length(), 1).unwrap();
        assert_eq!(last.run_count(), 2);
        assert_eq!(first.run_count(), 1);
        assert_eq!(arr.get(2u32).unwrap(), Value::Undefined);
    }

    #[test]
    fn bulk_operations_run_readers_once() {
        let arr = collection(&[3, 1, 2]);
        let items = items_reader(&arr);
        let first = {
            let arr = arr.clone();
            Effect::new(move || {
                let _ = arr.get(0u32);
            })
        };

        arr.sort().unwrap();
        assert_eq!(items.run_count(), 2);
        assert_eq!(first.run_count(), 2);

        arr.reverse().unwrap();
        arr.fill(0, 0, None).unwrap();
        assert_eq!(items.run_count(), 4);
    }

    #[test]
    fn resizing_always_notifies_length() {
        let arr = collection(&[]);
        let length = {
            let arr = arr.clone();
            Effect::new(move || {
                let _ = arr.len();
            })
        };
        // Popping an empty array changes nothing but still reports a resize.
        assert_eq!(arr.pop().unwrap(), Value::Undefined);
        assert_eq!(length.run_count(), 2);

        arr.push([1, 2]).unwrap();
        assert_eq!(length.run_count(), 3);
    }

    #[test]
    fn key_listing_tracks_items() {
        let arr = collection(&[1, 2]);
        let keys = {
            let arr = arr.clone();
            Effect::new(move || {
                let _ = arr.own_keys();
            })
        };
        arr.put(1u32, 7).unwrap();
        assert_eq!(keys.run_count(), 2);
    }

    #[test]
    fn plain_objects_pass_through() {
        let facade = wrap(
            &Object::from_entries([("x", 1)]),
            Some(Rc::new(Collection::default())),
        );
        let items = items_reader(&facade);
        facade.put("x", 2).unwrap();
        assert_eq!(items.run_count(), 1);
        assert_eq!(facade.get("x").unwrap(), Value::from(2));
    }
}
