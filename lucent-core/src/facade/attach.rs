//! Raw object ⇄ facade association.
//!
//! The link lives in a slot on the raw object outside its property table, so
//! it never shows up in keys, lookups or JSON snapshots. It is weak: a facade
//! nobody holds goes away even while its raw object lives on.

use std::rc::{Rc, Weak};

use crate::error::{Result, StoreError};
use crate::object::Object;

use super::Facade;

/// Associate `raw` with `facade`, replacing any previous link. `None` detaches.
///
/// Facades themselves carry no link; attaching one is a no-op.
pub fn attach(raw: &Object, facade: Option<&Facade>) {
    let Some(plain) = raw.as_plain() else {
        return;
    };
    *plain.attachment.borrow_mut() = match facade {
        Some(facade) => Rc::downgrade(&facade.as_object().0),
        None => Weak::new(),
    };
}

/// The live facade attached to `raw`, if any.
pub fn is_attached(raw: &Object) -> Option<Facade> {
    let plain = raw.as_plain()?;
    let kind = plain.attachment.borrow().upgrade()?;
    Object(kind).as_facade()
}

/// The facade attached to `raw`.
pub fn get_facade(raw: &Object) -> Result<Facade> {
    is_attached(raw).ok_or(StoreError::NotAttached)
}

/// The raw object behind a facade.
pub fn get_raw(object: &Object) -> Result<Object> {
    object
        .as_facade()
        .map(|facade| facade.raw().clone())
        .ok_or(StoreError::NotAttached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::wrap;

    #[test]
    fn wrapping_attaches() {
        let raw = Object::new();
        assert!(is_attached(&raw).is_none());
        let facade = wrap(&raw, None);
        assert_eq!(get_facade(&raw).unwrap(), facade);
        assert!(Object::ptr_eq(&get_raw(&facade).unwrap(), &raw));
    }

    #[test]
    fn lookups_on_unwrapped_objects_fail() {
        let raw = Object::new();
        assert_eq!(get_facade(&raw).unwrap_err(), StoreError::NotAttached);
        assert_eq!(get_raw(&raw).unwrap_err(), StoreError::NotAttached);
    }

    #[test]
    fn attachment_is_invisible() {
        let raw = Object::from_entries([("x", 1)]);
        let _facade = wrap(&raw, None);
        assert_eq!(raw.own_keys(), [crate::object::PropertyKey::from("x")]);
    }

    #[test]
    fn detached_raw_gets_a_new_facade() {
        let raw = Object::new();
        let first = wrap(&raw, None);
        attach(&raw, None);
        let second = wrap(&raw, None);
        assert_ne!(first, second);
    }

    #[test]
    fn dropped_facade_leaves_no_link() {
        let raw = Object::new();
        drop(wrap(&raw, None));
        assert!(is_attached(&raw).is_none());
    }
}
