//! Dynamic Object Model
//!
//! Objects are reference-counted handles to either a plain object (a property
//! table with a prototype link) or a facade (a raw object observed through a
//! policy). Both answer the same set of operations, so a facade can stand
//! anywhere an object can, including another object's prototype chain.
//!
//! # Operations
//!
//! The primitive operations mirror reflective object semantics:
//! `get_own_property`, `define_property`, `delete`, `has`, `own_keys`,
//! `get_prototype`/`set_prototype`, `is_extensible`/`prevent_extensions`.
//! `get` and `set` take an explicit receiver, which is what getters and
//! setters see as their `this`.
//!
//! On a plain object the operations apply the default semantics directly. On a
//! facade they are routed through the facade's policy chain.

mod array;
mod descriptor;
mod json;
mod key;
mod plain;
mod value;

use std::fmt;
use std::rc::Rc;

pub use array::Mutation;
pub use descriptor::{
    descriptor_changed, Getter, PartialDescriptor, PropertyDescriptor, PropertyKind, Setter,
};
pub use key::PropertyKey;
pub use value::{default_comparator, same_value, same_value_zero, Comparator, Value};

pub(crate) use plain::{Class, PlainObject};

use crate::error::{Result, StoreError};
use crate::facade::{Facade, FacadeInner};

pub(crate) enum ObjectKind {
    Plain(PlainObject),
    Facade(Rc<FacadeInner>),
}

/// A handle to a plain object or a facade.
#[derive(Clone)]
pub struct Object(pub(crate) Rc<ObjectKind>);

impl Object {
    /// An empty ordinary object with no prototype.
    pub fn new() -> Self {
        Self::with_prototype(None)
    }

    pub fn with_prototype(proto: Option<Object>) -> Self {
        Self::plain(Class::Ordinary, proto)
    }

    /// An empty array.
    pub fn array() -> Self {
        Self::plain(Class::Array, None)
    }

    /// An array holding `values` at indices `0..n`.
    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        let array = Self::array();
        if let ObjectKind::Plain(plain) = &*array.0 {
            for (i, value) in values.into_iter().enumerate() {
                // A fresh array accepts every index.
                let _ = plain.define_own_property(
                    &PropertyKey::Index(i as u32),
                    PartialDescriptor::data(value),
                );
            }
        }
        array
    }

    /// An ordinary object with one data property per entry.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<PropertyKey>,
        V: Into<Value>,
    {
        let object = Self::new();
        if let ObjectKind::Plain(plain) = &*object.0 {
            for (key, value) in entries {
                let _ = plain.define_own_property(&key.into(), PartialDescriptor::data(value));
            }
        }
        object
    }

    fn plain(class: Class, proto: Option<Object>) -> Self {
        Self(Rc::new(ObjectKind::Plain(PlainObject::new(class, proto))))
    }

    pub fn ptr_eq(a: &Object, b: &Object) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    pub fn is_facade(&self) -> bool {
        matches!(&*self.0, ObjectKind::Facade(_))
    }

    /// Whether this is an array, looking through facades.
    pub fn is_array(&self) -> bool {
        match &*self.0 {
            ObjectKind::Plain(plain) => plain.is_array(),
            ObjectKind::Facade(inner) => inner.raw.is_array(),
        }
    }

    pub(crate) fn as_plain(&self) -> Option<&PlainObject> {
        match &*self.0 {
            ObjectKind::Plain(plain) => Some(plain),
            ObjectKind::Facade(_) => None,
        }
    }

    /// The facade this handle points to, if it is one.
    pub fn as_facade(&self) -> Option<Facade> {
        match &*self.0 {
            ObjectKind::Facade(inner) => Some(Facade::from_parts(self.clone(), inner.clone())),
            ObjectKind::Plain(_) => None,
        }
    }

    pub fn get(&self, key: impl Into<PropertyKey>) -> Result<Value> {
        self.get_with_receiver(key, self)
    }

    /// Read `key`, running any getter with `receiver` as its target.
    pub fn get_with_receiver(&self, key: impl Into<PropertyKey>, receiver: &Object) -> Result<Value> {
        let key = key.into();
        match &*self.0 {
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                inner.policy.get(&facade, &key, receiver)
            }
            ObjectKind::Plain(plain) => match plain.get_own_property(&key) {
                Some(desc) => match desc.kind {
                    PropertyKind::Data { value, .. } => Ok(value),
                    PropertyKind::Accessor { get: Some(get), .. } => get(receiver),
                    PropertyKind::Accessor { get: None, .. } => Ok(Value::Undefined),
                },
                None => {
                    let parent = plain.proto.borrow().clone();
                    match parent {
                        Some(parent) => parent.get_with_receiver(key, receiver),
                        None => Ok(Value::Undefined),
                    }
                }
            },
        }
    }

    /// Assign `key`. Returns `Ok(false)` where a non-strict assignment would
    /// silently fail.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<bool> {
        self.set_with_receiver(key, value, self)
    }

    /// Assign `key`, or fail with a type error.
    pub fn put(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        if self.set(key.clone(), value)? {
            Ok(())
        } else {
            Err(StoreError::Type(format!("cannot assign to property {key}")))
        }
    }

    pub fn set_with_receiver(
        &self,
        key: impl Into<PropertyKey>,
        value: impl Into<Value>,
        receiver: &Object,
    ) -> Result<bool> {
        let key = key.into();
        let value = value.into();
        let plain = match &*self.0 {
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                return inner.policy.set(&facade, &key, value, receiver);
            }
            ObjectKind::Plain(plain) => plain,
        };

        let own = match plain.get_own_property(&key) {
            Some(desc) => desc,
            None => {
                let parent = plain.proto.borrow().clone();
                match parent {
                    Some(parent) => return parent.set_with_receiver(key, value, receiver),
                    None => PropertyDescriptor::data(Value::Undefined),
                }
            }
        };

        match own.kind {
            PropertyKind::Data { writable: false, .. } => Ok(false),
            PropertyKind::Data { .. } => match receiver.get_own_property(key.clone()) {
                Some(existing) => match existing.kind {
                    PropertyKind::Data { writable: true, .. } => {
                        receiver.define_property(key, PartialDescriptor::value(value))
                    }
                    _ => Ok(false),
                },
                None => receiver.define_property(key, PartialDescriptor::data(value)),
            },
            PropertyKind::Accessor { set: Some(set), .. } => {
                set(receiver, value)?;
                Ok(true)
            }
            PropertyKind::Accessor { set: None, .. } => Ok(false),
        }
    }

    pub fn get_own_property(&self, key: impl Into<PropertyKey>) -> Option<PropertyDescriptor> {
        let key = key.into();
        match &*self.0 {
            ObjectKind::Plain(plain) => plain.get_own_property(&key),
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                inner.policy.get_own_property(&facade, &key)
            }
        }
    }

    /// Look `key` up along the prototype chain.
    pub fn find_property(&self, key: impl Into<PropertyKey>) -> Option<PropertyDescriptor> {
        let key = key.into();
        let mut current = Some(self.clone());
        while let Some(object) = current {
            if let Some(desc) = object.get_own_property(key.clone()) {
                return Some(desc);
            }
            current = object.get_prototype();
        }
        None
    }

    /// Create or update an own property.
    ///
    /// Fails only for an invalid array length.
    pub fn define_property(
        &self,
        key: impl Into<PropertyKey>,
        desc: impl Into<PartialDescriptor>,
    ) -> Result<bool> {
        let key = key.into();
        let desc = desc.into();
        match &*self.0 {
            ObjectKind::Plain(plain) => plain.define_own_property(&key, desc),
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                inner.policy.define_property(&facade, &key, desc)
            }
        }
    }

    /// Delete an own property. Deleting a missing key succeeds.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        match &*self.0 {
            ObjectKind::Plain(plain) => plain.delete(&key),
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                inner.policy.delete(&facade, &key)
            }
        }
    }

    /// Delete an own property, or fail with a type error.
    pub fn remove(&self, key: impl Into<PropertyKey>) -> Result<()> {
        let key = key.into();
        if self.delete(key.clone()) {
            Ok(())
        } else {
            Err(StoreError::Type(format!("cannot delete property {key}")))
        }
    }

    /// Whether `key` is present here or on the prototype chain.
    pub fn has(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        match &*self.0 {
            ObjectKind::Plain(plain) => {
                if plain.get_own_property(&key).is_some() {
                    return true;
                }
                let parent = plain.proto.borrow().clone();
                parent.is_some_and(|parent| parent.has(key))
            }
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                inner.policy.has(&facade, &key)
            }
        }
    }

    /// Own keys: indices ascending, then names in insertion order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        match &*self.0 {
            ObjectKind::Plain(plain) => plain.own_keys(),
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                inner.policy.own_keys(&facade)
            }
        }
    }

    /// Own enumerable keys, in `own_keys` order.
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.own_keys()
            .into_iter()
            .filter(|key| {
                self.get_own_property(key)
                    .is_some_and(|desc| desc.enumerable)
            })
            .collect()
    }

    pub fn get_prototype(&self) -> Option<Object> {
        match &*self.0 {
            ObjectKind::Plain(plain) => plain.proto.borrow().clone(),
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                inner.policy.get_prototype(&facade)
            }
        }
    }

    /// Replace the prototype. Fails on a non-extensible object or when the
    /// new chain would loop back to this object.
    pub fn set_prototype(&self, proto: Option<Object>) -> bool {
        let plain = match &*self.0 {
            ObjectKind::Plain(plain) => plain,
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                return inner.policy.set_prototype(&facade, proto);
            }
        };

        let current = plain.proto.borrow().clone();
        if same_object(current.as_ref(), proto.as_ref()) {
            return true;
        }
        if !plain.is_extensible() {
            return false;
        }

        // Facades answer for their own chain, so the walk stops at one.
        let mut link = proto.clone();
        while let Some(object) = link {
            if Object::ptr_eq(&object, self) {
                return false;
            }
            link = match &*object.0 {
                ObjectKind::Plain(next) => next.proto.borrow().clone(),
                ObjectKind::Facade(_) => None,
            };
        }

        *plain.proto.borrow_mut() = proto;
        true
    }

    pub fn is_extensible(&self) -> bool {
        match &*self.0 {
            ObjectKind::Plain(plain) => plain.is_extensible(),
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                inner.policy.is_extensible(&facade)
            }
        }
    }

    pub fn prevent_extensions(&self) -> bool {
        match &*self.0 {
            ObjectKind::Plain(plain) => plain.prevent_extensions(),
            ObjectKind::Facade(inner) => {
                let facade = Facade::from_parts(self.clone(), inner.clone());
                inner.policy.prevent_extensions(&facade)
            }
        }
    }
}

/// Identity comparison of two optional objects.
pub fn same_object(a: Option<&Object>, b: Option<&Object>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Object::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ptr = Rc::as_ptr(&self.0) as *const ();
        match &*self.0 {
            ObjectKind::Plain(plain) if plain.is_array() => write!(f, "Array({ptr:p})"),
            ObjectKind::Plain(_) => write!(f, "Object({ptr:p})"),
            ObjectKind::Facade(inner) => {
                write!(f, "Facade({ptr:p}, {})", inner.policy.name())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn reads_walk_the_prototype_chain() {
        let base = Object::from_entries([("greeting", "hi")]);
        let child = Object::with_prototype(Some(base.clone()));
        assert_eq!(child.get("greeting").unwrap(), Value::from("hi"));
        assert!(child.has("greeting"));
        assert!(child.get_own_property("greeting").is_none());
    }

    #[test]
    fn assignment_shadows_inherited_data() {
        let base = Object::from_entries([("x", 1)]);
        let child = Object::with_prototype(Some(base.clone()));
        child.put("x", 2).unwrap();
        assert_eq!(child.get("x").unwrap(), Value::from(2));
        assert_eq!(base.get("x").unwrap(), Value::from(1));
    }

    #[test]
    fn getters_see_the_receiver() {
        let base = Object::new();
        base.define_property(
            "double",
            PartialDescriptor::getter(|this| {
                let n = this.get("n")?.as_number().unwrap_or(0.0);
                Ok(Value::from(n * 2.0))
            }),
        )
        .unwrap();
        let child = Object::with_prototype(Some(base));
        child.put("n", 21).unwrap();
        assert_eq!(child.get("double").unwrap(), Value::from(42));
    }

    #[test]
    fn inherited_setter_runs_instead_of_shadowing() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let base = Object::new();
        base.define_property(
            "x",
            PartialDescriptor::getter(|_| Ok(Value::Undefined)).with_setter(move |_, _| {
                seen.set(seen.get() + 1);
                Ok(())
            }),
        )
        .unwrap();
        let child = Object::with_prototype(Some(base));
        assert!(child.set("x", 1).unwrap());
        assert_eq!(calls.get(), 1);
        assert!(child.get_own_property("x").is_none());
    }

    #[test]
    fn getter_errors_propagate() {
        let obj = Object::new();
        obj.define_property("boom", PartialDescriptor::getter(|_| Err(StoreError::thrown("boom"))))
            .unwrap();
        assert_eq!(obj.get("boom").unwrap_err(), StoreError::thrown("boom"));
    }

    #[test]
    fn prototype_cycles_are_rejected() {
        let a = Object::new();
        let b = Object::with_prototype(Some(a.clone()));
        assert!(!a.set_prototype(Some(b)));
        assert!(a.get_prototype().is_none());
    }

    #[test]
    fn frozen_shape_rejects_new_keys() {
        let obj = Object::from_entries([("x", 1)]);
        assert!(obj.prevent_extensions());
        assert!(!obj.set("y", 1).unwrap());
        assert!(obj.put("y", 1).is_err());
        assert!(obj.set("x", 2).unwrap());
    }

    #[test]
    fn keys_skip_hidden_properties() {
        let arr = Object::from_values([1, 2]);
        let keys: Vec<String> = arr.keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, ["0", "1"]);
        assert_eq!(arr.own_keys().len(), 3);
    }
}
