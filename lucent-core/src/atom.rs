//! Atoms: engine-agnostic reactive values.
//!
//! An atom is a read function plus, for writable atoms, a write function.
//! Nothing runs at construction time; reactivity comes from whatever the read
//! function touches.
//!
//! Generic code can attempt a write through [`AtomLike::try_set`] without
//! knowing whether the target is writable.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::object::{Object, PropertyKey, Value};
use crate::reactive::Signal;

/// Common interface of [`Atom`] and [`ReadOnlyAtom`].
pub trait AtomLike<T> {
    fn value(&self) -> Result<T>;

    /// Write if possible. `Ok(false)` means the atom is read-only.
    fn try_set(&self, value: T) -> Result<bool>;
}

type Read<T> = Rc<dyn Fn() -> Result<T>>;
type Write<T> = Rc<dyn Fn(T) -> Result<()>>;

/// A read-only atom.
pub struct ReadOnlyAtom<T> {
    read: Read<T>,
}

impl<T: 'static> ReadOnlyAtom<T> {
    pub fn new(read: impl Fn() -> Result<T> + 'static) -> Self {
        Self {
            read: Rc::new(read),
        }
    }

    pub fn value(&self) -> Result<T> {
        (self.read)()
    }

    pub fn try_set(&self, _value: T) -> Result<bool> {
        Ok(false)
    }

    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> ReadOnlyAtom<U> {
        let read = self.read.clone();
        ReadOnlyAtom::new(move || read().map(&f))
    }
}

impl<T: 'static> AtomLike<T> for ReadOnlyAtom<T> {
    fn value(&self) -> Result<T> {
        ReadOnlyAtom::value(self)
    }

    fn try_set(&self, value: T) -> Result<bool> {
        ReadOnlyAtom::try_set(self, value)
    }
}

impl<T> Clone for ReadOnlyAtom<T> {
    fn clone(&self) -> Self {
        Self {
            read: self.read.clone(),
        }
    }
}

impl<T> fmt::Debug for ReadOnlyAtom<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyAtom").finish_non_exhaustive()
    }
}

/// A readable and writable atom.
pub struct Atom<T> {
    read: Read<T>,
    write: Write<T>,
}

impl<T: 'static> Atom<T> {
    pub fn new(
        read: impl Fn() -> Result<T> + 'static,
        write: impl Fn(T) -> Result<()> + 'static,
    ) -> Self {
        Self {
            read: Rc::new(read),
            write: Rc::new(write),
        }
    }

    pub fn value(&self) -> Result<T> {
        (self.read)()
    }

    pub fn set_value(&self, value: T) -> Result<()> {
        (self.write)(value)
    }

    /// Write and report success; errors from the write propagate.
    pub fn try_set(&self, value: T) -> Result<bool> {
        self.set_value(value)?;
        Ok(true)
    }

    /// A read-only view of this atom.
    pub fn read_only(&self) -> ReadOnlyAtom<T> {
        ReadOnlyAtom {
            read: self.read.clone(),
        }
    }

    /// A two-way mapping onto another type.
    pub fn convert<U: 'static>(
        &self,
        to: impl Fn(T) -> U + 'static,
        from: impl Fn(U) -> T + 'static,
    ) -> Atom<U> {
        let read = self.read.clone();
        let write = self.write.clone();
        Atom::new(move || read().map(&to), move |value| write(from(value)))
    }

    /// An atom forwarding to whatever `bind` currently points at, or to a
    /// private fallback atom when it points nowhere.
    ///
    /// The fallback is created on first use and then kept.
    pub fn source(
        bind: impl Fn() -> Option<Atom<T>> + 'static,
        fallback: impl Fn() -> Atom<T> + 'static,
    ) -> Atom<T> {
        let cache: Rc<OnceCell<Atom<T>>> = Rc::new(OnceCell::new());

        let target = move || -> Atom<T> {
            match bind() {
                Some(atom) => atom,
                None => cache.get_or_init(|| fallback()).clone(),
            }
        };
        let target = Rc::new(target);
        let read_target = target.clone();
        Atom::new(
            move || read_target().value(),
            move |value| target().set_value(value),
        )
    }
}

impl<T: Clone + 'static> Atom<T> {
    /// Wrap an existing signal.
    pub fn from_signal(signal: Signal<T>) -> Self {
        let reader = signal.clone();
        Atom::new(move || Ok(reader.get()), move |value| {
            signal.set(value);
            Ok(())
        })
    }

    /// A fresh cell holding `initial`.
    pub fn cell(initial: T) -> Self
    where
        T: PartialEq,
    {
        Self::from_signal(Signal::new(initial))
    }
}

impl Atom<Value> {
    /// An atom bound to property `key` of the object `object` returns.
    ///
    /// `object` runs on every access, so it may itself read reactively. `key`
    /// runs once, on first access.
    pub fn prop(
        object: impl Fn() -> Result<Object> + 'static,
        key: impl Fn() -> PropertyKey + 'static,
    ) -> Atom<Value> {
        let object = Rc::new(object);
        let key = Rc::new(key);
        let resolved: Rc<OnceCell<PropertyKey>> = Rc::new(OnceCell::new());

        let (read_object, read_key, read_resolved) = (object.clone(), key.clone(), resolved.clone());
        Atom::new(
            move || {
                let key = read_resolved.get_or_init(|| read_key());
                read_object()?.get(key)
            },
            move |value| {
                let key = resolved.get_or_init(|| key());
                object()?.put(key, value)
            },
        )
    }
}

impl<T: 'static> AtomLike<T> for Atom<T> {
    fn value(&self) -> Result<T> {
        Atom::value(self)
    }

    fn try_set(&self, value: T) -> Result<bool> {
        Atom::try_set(self, value)
    }
}

impl<T> Clone for Atom<T> {
    fn clone(&self) -> Self {
        Self {
            read: self.read.clone(),
            write: self.write.clone(),
        }
    }
}

impl<T> fmt::Debug for Atom<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::facade::wrap;
    use crate::reactive::Effect;
    use std::cell::Cell;

    #[test]
    fn read_only_refuses_writes() {
        let atom = ReadOnlyAtom::new(|| Ok(1));
        assert_eq!(atom.value().unwrap(), 1);
        assert!(!atom.try_set(2).unwrap());
        assert_eq!(atom.value().unwrap(), 1);
    }

    #[test]
    fn writable_atoms_accept_writes() {
        let atom = Atom::cell(1);
        assert!(atom.try_set(2).unwrap());
        assert_eq!(atom.value().unwrap(), 2);
        assert_eq!(atom.read_only().value().unwrap(), 2);
    }

    #[test]
    fn generic_code_sees_both_kinds() {
        fn bump(atom: &dyn AtomLike<i32>) -> bool {
            let next = atom.value().unwrap() + 1;
            atom.try_set(next).unwrap()
        }
        let cell = Atom::cell(1);
        assert!(bump(&cell));
        assert!(!bump(&cell.read_only()));
        assert_eq!(cell.value().unwrap(), 2);
    }

    #[test]
    fn convert_maps_both_ways() {
        let celsius = Atom::cell(100.0);
        let fahrenheit = celsius.convert(|c| c * 9.0 / 5.0 + 32.0, |f| (f - 32.0) * 5.0 / 9.0);
        assert_eq!(fahrenheit.value().unwrap(), 212.0);
        fahrenheit.set_value(32.0).unwrap();
        assert_eq!(celsius.value().unwrap(), 0.0);
    }

    #[test]
    fn signal_atoms_are_reactive() {
        let atom = Atom::cell(0);
        let reader = atom.clone();
        let effect = Effect::new(move || {
            let _ = reader.value();
        });
        atom.set_value(1).unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn prop_resolves_its_key_once() {
        let facade = wrap(&Object::from_entries([("name", "a")]), None);
        let lookups = Rc::new(Cell::new(0));
        let counter = lookups.clone();
        let target = facade.as_object().clone();
        let name = Atom::prop(
            move || Ok(target.clone()),
            move || {
                counter.set(counter.get() + 1);
                PropertyKey::from("name")
            },
        );

        assert_eq!(name.value().unwrap(), Value::from("a"));
        name.set_value(Value::from("b")).unwrap();
        assert_eq!(facade.get("name").unwrap(), Value::from("b"));
        assert_eq!(lookups.get(), 1);
    }

    #[test]
    fn prop_write_failures_propagate() {
        let raw = Object::new();
        raw.prevent_extensions();
        let target = raw.clone();
        let atom = Atom::prop(move || Ok(target.clone()), || PropertyKey::from("x"));
        assert!(matches!(atom.set_value(Value::from(1)), Err(StoreError::Type(_))));
    }

    #[test]
    fn source_follows_binding_or_fallback() {
        let bound: Signal<Option<i32>> = Signal::new(None);
        let external = Atom::cell(10);
        let created = Rc::new(Cell::new(0));

        let binding = {
            let bound = bound.clone();
            let external = external.clone();
            move || bound.get().map(|_| external.clone())
        };
        let fallback = {
            let created = created.clone();
            move || {
                created.set(created.get() + 1);
                Atom::cell(0)
            }
        };
        let field = Atom::source(binding, fallback);

        field.set_value(5).unwrap();
        assert_eq!(field.value().unwrap(), 5);
        assert_eq!(created.get(), 1);

        bound.set(Some(1));
        assert_eq!(field.value().unwrap(), 10);
        field.set_value(11).unwrap();
        assert_eq!(external.value().unwrap(), 11);

        bound.set(None);
        assert_eq!(field.value().unwrap(), 5);
        assert_eq!(created.get(), 1);
    }
}
