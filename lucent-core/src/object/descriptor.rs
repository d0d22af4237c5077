//! Property descriptors.
//!
//! Each own property is either a data property (a value plus a writable flag)
//! or an accessor (getter and/or setter). Classification happens from the
//! descriptor table rather than by inspecting values, which is what lets the
//! tracking and memoization layers treat the two kinds differently.

use std::fmt;
use std::rc::Rc;

use super::{Object, Value};
use crate::error::Result;

/// A getter, invoked with the receiver of the read.
pub type Getter = Rc<dyn Fn(&Object) -> Result<Value>>;

/// A setter, invoked with the receiver of the write.
pub type Setter = Rc<dyn Fn(&Object, Value) -> Result<()>>;

#[derive(Clone)]
pub enum PropertyKind {
    Data { value: Value, writable: bool },
    Accessor { get: Option<Getter>, set: Option<Setter> },
}

/// A complete own-property descriptor.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub kind: PropertyKind,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertyDescriptor {
    /// A writable, enumerable, configurable data property.
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            kind: PropertyKind::Data {
                value: value.into(),
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// An enumerable, configurable accessor.
    pub fn accessor(get: Option<Getter>, set: Option<Setter>) -> Self {
        Self {
            kind: PropertyKind::Accessor { get, set },
            enumerable: true,
            configurable: true,
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.kind, PropertyKind::Accessor { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            PropertyKind::Data { value, .. } => Some(value),
            PropertyKind::Accessor { .. } => None,
        }
    }

    pub fn getter(&self) -> Option<&Getter> {
        match &self.kind {
            PropertyKind::Accessor { get, .. } => get.as_ref(),
            PropertyKind::Data { .. } => None,
        }
    }

    /// Same attributes, same accessor functions, and values equal under `cmp`.
    pub fn same_as(&self, other: &PropertyDescriptor, cmp: &dyn Fn(&Value, &Value) -> bool) -> bool {
        if self.enumerable != other.enumerable || self.configurable != other.configurable {
            return false;
        }
        match (&self.kind, &other.kind) {
            (
                PropertyKind::Data { value: a, writable: wa },
                PropertyKind::Data { value: b, writable: wb },
            ) => wa == wb && cmp(a, b),
            (
                PropertyKind::Accessor { get: ga, set: sa },
                PropertyKind::Accessor { get: gb, set: sb },
            ) => same_fn(ga, gb) && same_fn(sa, sb),
            _ => false,
        }
    }
}

pub(crate) fn same_fn<F: ?Sized>(a: &Option<Rc<F>>, b: &Option<Rc<F>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Whether a property changed observably between two snapshots.
pub fn descriptor_changed(
    prev: Option<&PropertyDescriptor>,
    next: Option<&PropertyDescriptor>,
    cmp: &dyn Fn(&Value, &Value) -> bool,
) -> bool {
    match (prev, next) {
        (Some(prev), Some(next)) => !prev.same_as(next, cmp),
        (None, None) => false,
        _ => true,
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("PropertyDescriptor");
        match &self.kind {
            PropertyKind::Data { value, writable } => {
                out.field("value", value).field("writable", writable);
            }
            PropertyKind::Accessor { get, set } => {
                out.field("get", &get.is_some()).field("set", &set.is_some());
            }
        }
        out.field("enumerable", &self.enumerable)
            .field("configurable", &self.configurable)
            .finish()
    }
}

/// A descriptor update: only the fields present are applied.
///
/// `get`/`set` use a nested `Option` so "remove the getter" (`Some(None)`)
/// differs from "leave the getter alone" (`None`).
#[derive(Clone, Default)]
pub struct PartialDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub get: Option<Option<Getter>>,
    pub set: Option<Option<Setter>>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PartialDescriptor {
    /// Change only the value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// A data property as created by a plain assignment.
    pub fn data(value: impl Into<Value>) -> Self {
        PropertyDescriptor::data(value).into()
    }

    /// An enumerable, configurable getter-only accessor.
    pub fn getter(get: impl Fn(&Object) -> Result<Value> + 'static) -> Self {
        PropertyDescriptor::accessor(Some(Rc::new(get)), None).into()
    }

    pub fn with_setter(mut self, set: impl Fn(&Object, Value) -> Result<()> + 'static) -> Self {
        self.set = Some(Some(Rc::new(set)));
        self
    }

    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = Some(enumerable);
        self
    }

    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = Some(configurable);
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = Some(writable);
        self
    }

    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }
}

impl From<PropertyDescriptor> for PartialDescriptor {
    fn from(desc: PropertyDescriptor) -> Self {
        let mut out = PartialDescriptor {
            enumerable: Some(desc.enumerable),
            configurable: Some(desc.configurable),
            ..PartialDescriptor::default()
        };
        match desc.kind {
            PropertyKind::Data { value, writable } => {
                out.value = Some(value);
                out.writable = Some(writable);
            }
            PropertyKind::Accessor { get, set } => {
                out.get = Some(get);
                out.set = Some(set);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::same_value_zero;

    #[test]
    fn data_descriptors_compare_by_value() {
        let a = PropertyDescriptor::data(1);
        let b = PropertyDescriptor::data(1);
        let c = PropertyDescriptor::data(2);
        assert!(a.same_as(&b, &same_value_zero));
        assert!(!a.same_as(&c, &same_value_zero));
    }

    #[test]
    fn attribute_change_is_a_change() {
        let a = PropertyDescriptor::data(1);
        let mut b = a.clone();
        b.enumerable = false;
        assert!(descriptor_changed(Some(&a), Some(&b), &same_value_zero));
        assert!(descriptor_changed(None, Some(&a), &same_value_zero));
    }

    #[test]
    fn accessors_compare_by_function_identity() {
        let get: Getter = Rc::new(|_| Ok(Value::from(1)));
        let a = PropertyDescriptor::accessor(Some(get.clone()), None);
        let b = PropertyDescriptor::accessor(Some(get), None);
        let c = PropertyDescriptor::accessor(Some(Rc::new(|_| Ok(Value::from(1)))), None);
        assert!(a.same_as(&b, &same_value_zero));
        assert!(!a.same_as(&c, &same_value_zero));
    }
}
