//! Plain objects: ordinary property semantics plus the array length rules.
//!
//! Nothing here calls user code. Getters and setters are invoked one level up,
//! in `Object`, after every borrow of the property table has been released.

use std::cell::{Cell, RefCell};
use std::rc::Weak;

use indexmap::IndexMap;

use super::descriptor::same_fn;
use super::{
    same_value, Object, ObjectKind, PartialDescriptor, PropertyDescriptor, PropertyKey,
    PropertyKind, Value,
};
use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Class {
    Ordinary,
    Array,
}

pub(crate) struct PlainObject {
    class: Class,
    props: RefCell<IndexMap<PropertyKey, PropertyDescriptor>>,
    pub(crate) proto: RefCell<Option<Object>>,
    extensible: Cell<bool>,
    /// Weak link to the facade wrapping this object, outside the property table.
    pub(crate) attachment: RefCell<Weak<ObjectKind>>,
}

impl PlainObject {
    pub(crate) fn new(class: Class, proto: Option<Object>) -> Self {
        let mut props = IndexMap::new();
        if class == Class::Array {
            props.insert(
                PropertyKey::length(),
                PropertyDescriptor {
                    kind: PropertyKind::Data {
                        value: Value::from(0u32),
                        writable: true,
                    },
                    enumerable: false,
                    configurable: false,
                },
            );
        }
        Self {
            class,
            props: RefCell::new(props),
            proto: RefCell::new(proto),
            extensible: Cell::new(true),
            attachment: RefCell::new(Weak::new()),
        }
    }

    pub(crate) fn is_array(&self) -> bool {
        self.class == Class::Array
    }

    pub(crate) fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        self.props.borrow().get(key).cloned()
    }

    pub(crate) fn own_keys(&self) -> Vec<PropertyKey> {
        let props = self.props.borrow();
        let mut indices: Vec<u32> = props.keys().filter_map(PropertyKey::as_index).collect();
        indices.sort_unstable();
        indices
            .into_iter()
            .map(PropertyKey::Index)
            .chain(props.keys().filter(|k| k.as_index().is_none()).cloned())
            .collect()
    }

    pub(crate) fn delete(&self, key: &PropertyKey) -> bool {
        let mut props = self.props.borrow_mut();
        match props.get(key) {
            None => true,
            Some(desc) if !desc.configurable => false,
            Some(_) => {
                props.shift_remove(key);
                true
            }
        }
    }

    pub(crate) fn is_extensible(&self) -> bool {
        self.extensible.get()
    }

    pub(crate) fn prevent_extensions(&self) -> bool {
        self.extensible.set(false);
        true
    }

    pub(crate) fn define_own_property(
        &self,
        key: &PropertyKey,
        desc: PartialDescriptor,
    ) -> Result<bool> {
        if self.is_array() {
            if key.is_length() {
                return self.set_length(desc);
            }
            if let Some(index) = key.as_index() {
                let (len, len_writable) = self.length_slot();
                if index >= len && !len_writable {
                    return Ok(false);
                }
                let grown = match index.checked_add(1) {
                    Some(next) => next.max(len),
                    None => return Err(StoreError::Range("invalid array length".into())),
                };
                if !self.define_ordinary(key, desc) {
                    return Ok(false);
                }
                if grown > len {
                    self.store_length(grown);
                }
                return Ok(true);
            }
        }
        Ok(self.define_ordinary(key, desc))
    }

    /// Current length and whether it may change. Ordinary objects report (0, false).
    pub(crate) fn length_slot(&self) -> (u32, bool) {
        match self.props.borrow().get(&PropertyKey::length()) {
            Some(PropertyDescriptor {
                kind: PropertyKind::Data { value, writable },
                ..
            }) if self.is_array() => (value.as_number().unwrap_or(0.0) as u32, *writable),
            _ => (0, false),
        }
    }

    fn store_length(&self, len: u32) {
        if let Some(PropertyDescriptor {
            kind: PropertyKind::Data { value, .. },
            ..
        }) = self.props.borrow_mut().get_mut(&PropertyKey::length())
        {
            *value = Value::from(len);
        }
    }

    fn set_length(&self, mut desc: PartialDescriptor) -> Result<bool> {
        let length = PropertyKey::length();
        let Some(value) = desc.value.take() else {
            return Ok(self.define_ordinary(&length, desc));
        };
        let new_len = to_array_length(&value)?;
        desc.value = Some(Value::from(new_len));

        let (old_len, writable) = self.length_slot();
        if new_len >= old_len {
            return Ok(self.define_ordinary(&length, desc));
        }
        if !writable {
            return Ok(false);
        }

        // Keep length writable while truncating; freeze it afterwards if asked.
        let freeze = desc.writable == Some(false);
        desc.writable = None;
        if !self.define_ordinary(&length, desc) {
            return Ok(false);
        }

        let mut doomed: Vec<u32> = self
            .props
            .borrow()
            .keys()
            .filter_map(PropertyKey::as_index)
            .filter(|&i| i >= new_len)
            .collect();
        doomed.sort_unstable_by(|a, b| b.cmp(a));
        for index in doomed {
            if !self.delete(&PropertyKey::Index(index)) {
                self.store_length(index.saturating_add(1));
                if freeze {
                    self.freeze_length();
                }
                return Ok(false);
            }
        }

        if freeze {
            self.freeze_length();
        }
        Ok(true)
    }

    fn freeze_length(&self) {
        if let Some(PropertyDescriptor {
            kind: PropertyKind::Data { writable, .. },
            ..
        }) = self.props.borrow_mut().get_mut(&PropertyKey::length())
        {
            *writable = false;
        }
    }

    /// Validate `desc` against the current property and apply it.
    fn define_ordinary(&self, key: &PropertyKey, desc: PartialDescriptor) -> bool {
        let current = self.props.borrow().get(key).cloned();
        let Some(current) = current else {
            if !self.extensible.get() {
                return false;
            }
            self.props
                .borrow_mut()
                .insert(key.clone(), create_from(desc));
            return true;
        };

        if !current.configurable && !compatible_with_locked(&current, &desc) {
            return false;
        }

        let merged = merge(current, desc);
        self.props.borrow_mut().insert(key.clone(), merged);
        true
    }
}

fn create_from(desc: PartialDescriptor) -> PropertyDescriptor {
    let kind = if desc.is_accessor() {
        PropertyKind::Accessor {
            get: desc.get.flatten(),
            set: desc.set.flatten(),
        }
    } else {
        PropertyKind::Data {
            value: desc.value.unwrap_or_default(),
            writable: desc.writable.unwrap_or(false),
        }
    };
    PropertyDescriptor {
        kind,
        enumerable: desc.enumerable.unwrap_or(false),
        configurable: desc.configurable.unwrap_or(false),
    }
}

/// Whether `desc` only makes changes a non-configurable property allows.
fn compatible_with_locked(current: &PropertyDescriptor, desc: &PartialDescriptor) -> bool {
    if desc.configurable == Some(true) {
        return false;
    }
    if desc.enumerable.is_some_and(|e| e != current.enumerable) {
        return false;
    }
    match &current.kind {
        PropertyKind::Data { value, writable } => {
            if desc.is_accessor() {
                return false;
            }
            if !writable {
                if desc.writable == Some(true) {
                    return false;
                }
                if desc.value.as_ref().is_some_and(|v| !same_value(v, value)) {
                    return false;
                }
            }
            true
        }
        PropertyKind::Accessor { get, set } => {
            if desc.is_data() {
                return false;
            }
            desc.get.as_ref().map_or(true, |g| same_fn(g, get))
                && desc.set.as_ref().map_or(true, |s| same_fn(s, set))
        }
    }
}

fn merge(current: PropertyDescriptor, desc: PartialDescriptor) -> PropertyDescriptor {
    let enumerable = desc.enumerable.unwrap_or(current.enumerable);
    let configurable = desc.configurable.unwrap_or(current.configurable);
    let kind = match current.kind {
        PropertyKind::Data { .. } if desc.is_accessor() => PropertyKind::Accessor {
            get: desc.get.flatten(),
            set: desc.set.flatten(),
        },
        PropertyKind::Accessor { .. } if desc.is_data() => PropertyKind::Data {
            value: desc.value.unwrap_or_default(),
            writable: desc.writable.unwrap_or(false),
        },
        PropertyKind::Data { value, writable } => PropertyKind::Data {
            value: desc.value.unwrap_or(value),
            writable: desc.writable.unwrap_or(writable),
        },
        PropertyKind::Accessor { get, set } => PropertyKind::Accessor {
            get: desc.get.unwrap_or(get),
            set: desc.set.unwrap_or(set),
        },
    };
    PropertyDescriptor {
        kind,
        enumerable,
        configurable,
    }
}

pub(crate) fn to_array_length(value: &Value) -> Result<u32> {
    match value.as_number() {
        Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) => Ok(n as u32),
        _ => Err(StoreError::Range(format!("invalid array length {value:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array() -> PlainObject {
        PlainObject::new(Class::Array, None)
    }

    #[test]
    fn index_past_end_grows_length() {
        let arr = array();
        assert!(arr
            .define_own_property(&PropertyKey::Index(4), PartialDescriptor::data(1))
            .unwrap());
        assert_eq!(arr.length_slot(), (5, true));
    }

    #[test]
    fn shrinking_length_drops_indices() {
        let arr = array();
        for i in 0..3 {
            arr.define_own_property(&PropertyKey::Index(i), PartialDescriptor::data(i))
                .unwrap();
        }
        assert!(arr
            .define_own_property(&PropertyKey::length(), PartialDescriptor::value(1u32))
            .unwrap());
        assert!(arr.get_own_property(&PropertyKey::Index(1)).is_none());
        assert!(arr.get_own_property(&PropertyKey::Index(0)).is_some());
    }

    #[test]
    fn locked_index_stops_truncation() {
        let arr = array();
        arr.define_own_property(&PropertyKey::Index(0), PartialDescriptor::data(0))
            .unwrap();
        arr.define_own_property(
            &PropertyKey::Index(1),
            PartialDescriptor::data(1).configurable(false),
        )
        .unwrap();
        arr.define_own_property(&PropertyKey::Index(2), PartialDescriptor::data(2))
            .unwrap();

        let ok = arr
            .define_own_property(&PropertyKey::length(), PartialDescriptor::value(0u32))
            .unwrap();
        assert!(!ok);
        assert_eq!(arr.length_slot().0, 2);
        assert!(arr.get_own_property(&PropertyKey::Index(2)).is_none());
    }

    #[test]
    fn invalid_length_is_a_range_error() {
        let arr = array();
        let err = arr
            .define_own_property(&PropertyKey::length(), PartialDescriptor::value(1.5))
            .unwrap_err();
        assert!(matches!(err, StoreError::Range(_)));
    }

    #[test]
    fn last_index_reaches_max_length() {
        let arr = array();
        assert!(arr
            .define_own_property(&PropertyKey::Index(u32::MAX - 1), PartialDescriptor::data(1))
            .unwrap());
        assert_eq!(arr.length_slot(), (u32::MAX, true));

        let err = arr
            .define_own_property(&PropertyKey::Index(u32::MAX), PartialDescriptor::data(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::Range(_)));
    }

    #[test]
    fn non_configurable_rejects_redefinition() {
        let obj = PlainObject::new(Class::Ordinary, None);
        let key = PropertyKey::from("x");
        obj.define_own_property(
            &key,
            PartialDescriptor::data(1).configurable(false).writable(false),
        )
        .unwrap();
        assert!(!obj
            .define_own_property(&key, PartialDescriptor::value(2))
            .unwrap());
        assert!(obj
            .define_own_property(&key, PartialDescriptor::value(1))
            .unwrap());
        assert!(!obj.delete(&key));
    }

    #[test]
    fn indices_list_before_names() {
        let obj = PlainObject::new(Class::Ordinary, None);
        for key in ["b", "2", "a", "0"] {
            obj.define_own_property(&PropertyKey::from(key), PartialDescriptor::data(true))
                .unwrap();
        }
        let keys: Vec<String> = obj.own_keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, ["0", "2", "b", "a"]);
    }
}
