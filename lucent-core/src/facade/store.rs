//! Dependency store.
//!
//! Maps tracking keys to reactive cells ("forcers"). A cell exists only while
//! some computation depends on it: it is created by the first tracked read and
//! evicted when the last computation that read it cleans up. Writes never
//! allocate.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::object::PropertyKey;
use crate::reactive::{on_cleanup, Runtime, Trigger};

/// What a dependency is on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackingKey {
    /// Value or presence of one own property.
    Property(PropertyKey),
    /// Identity of the prototype.
    Prototype,
    /// The extensibility flag.
    Extensible,
    /// The set of own keys.
    Shape,
    /// Any change to an ordered collection's elements or length.
    Items,
}

impl From<PropertyKey> for TrackingKey {
    fn from(key: PropertyKey) -> Self {
        TrackingKey::Property(key)
    }
}

/// A value-less reactive cell that counts the computations tracking it.
pub struct Forcer {
    trigger: Trigger,
    observers: Cell<usize>,
}

impl Forcer {
    fn new() -> Self {
        Self {
            trigger: Trigger::new(),
            observers: Cell::new(0),
        }
    }

    /// Register the running computation as a dependent.
    pub fn track(&self) {
        self.trigger.track();
    }

    /// Invalidate every dependent.
    pub fn notify(&self) {
        self.trigger.notify();
    }

    /// Number of live tracked reads.
    pub fn observers(&self) -> usize {
        self.observers.get()
    }
}

impl fmt::Debug for Forcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forcer")
            .field("observers", &self.observers.get())
            .field("subscribers", &self.trigger.subscriber_count())
            .finish()
    }
}

enum Entry {
    /// Never tracked here; accessors are observed through their memo instead.
    Excluded,
    Cell(Rc<Forcer>),
}

type Entries = RefCell<HashMap<TrackingKey, Entry>>;

/// Per-facade mapping from tracking key to cell.
#[derive(Clone, Default)]
pub struct DependencyStore {
    entries: Rc<Entries>,
}

impl DependencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `key` from the running computation, unless it is excluded.
    ///
    /// Outside a tracking computation this does nothing at all.
    pub fn track(&self, key: TrackingKey) {
        self.track_inner(key, false);
    }

    /// Track `key` even if it was excluded, replacing the exclusion.
    pub fn track_forced(&self, key: TrackingKey) {
        self.track_inner(key, true);
    }

    fn track_inner(&self, key: TrackingKey, force: bool) {
        if !Runtime::is_tracking() {
            return;
        }
        let forcer = {
            let mut entries = self.entries.borrow_mut();
            match entries.get(&key) {
                Some(Entry::Cell(forcer)) => forcer.clone(),
                Some(Entry::Excluded) if !force => return,
                _ => {
                    trace!(?key, "created cell");
                    let forcer = Rc::new(Forcer::new());
                    entries.insert(key.clone(), Entry::Cell(forcer.clone()));
                    forcer
                }
            }
        };

        forcer.observers.set(forcer.observers.get() + 1);
        forcer.track();

        let entries = Rc::downgrade(&self.entries);
        on_cleanup(move || release(&entries, key, forcer));
    }

    /// Mark a property as excluded, unless something already tracks it.
    pub fn exclude(&self, key: PropertyKey) {
        self.entries
            .borrow_mut()
            .entry(TrackingKey::Property(key))
            .or_insert(Entry::Excluded);
    }

    /// Drop an exclusion so the property can be tracked again.
    pub fn clear_exclusion(&self, key: &PropertyKey) {
        let key = TrackingKey::Property(key.clone());
        let mut entries = self.entries.borrow_mut();
        if matches!(entries.get(&key), Some(Entry::Excluded)) {
            entries.remove(&key);
        }
    }

    pub fn is_excluded(&self, key: &PropertyKey) -> bool {
        matches!(
            self.entries
                .borrow()
                .get(&TrackingKey::Property(key.clone())),
            Some(Entry::Excluded)
        )
    }

    /// Notify the cell for `key`, if one exists.
    pub fn notify(&self, key: &TrackingKey) {
        let forcer = self.forcer(key);
        if let Some(forcer) = forcer {
            forcer.notify();
        }
    }

    pub fn forcer(&self, key: &TrackingKey) -> Option<Rc<Forcer>> {
        match self.entries.borrow().get(key) {
            Some(Entry::Cell(forcer)) => Some(forcer.clone()),
            _ => None,
        }
    }

    /// Whether a live cell exists for `key`.
    pub fn is_tracked(&self, key: &TrackingKey) -> bool {
        self.forcer(key).is_some()
    }

    /// Property keys that currently have a live cell.
    pub fn tracked_properties(&self) -> Vec<PropertyKey> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|(key, entry)| match (key, entry) {
                (TrackingKey::Property(key), Entry::Cell(_)) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of entries, exclusions included.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

fn release(entries: &Weak<Entries>, key: TrackingKey, forcer: Rc<Forcer>) {
    let remaining = forcer.observers.get().saturating_sub(1);
    forcer.observers.set(remaining);
    if remaining > 0 {
        return;
    }
    let Some(entries) = entries.upgrade() else {
        return;
    };
    let mut entries = entries.borrow_mut();
    let current = matches!(entries.get(&key), Some(Entry::Cell(f)) if Rc::ptr_eq(f, &forcer));
    if current {
        trace!(?key, "evicted cell");
        entries.remove(&key);
    }
}

impl fmt::Debug for DependencyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        let excluded = entries
            .values()
            .filter(|e| matches!(e, Entry::Excluded))
            .count();
        f.debug_struct("DependencyStore")
            .field("cells", &(entries.len() - excluded))
            .field("excluded", &excluded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;

    fn name(key: &str) -> TrackingKey {
        TrackingKey::Property(PropertyKey::from(key))
    }

    #[test]
    fn untracked_reads_allocate_nothing() {
        let store = DependencyStore::new();
        store.track(name("x"));
        store.notify(&name("x"));
        assert!(store.is_empty());
    }

    #[test]
    fn cell_lives_as_long_as_its_readers() {
        let store = DependencyStore::new();
        let reader = store.clone();
        let effect = Effect::new(move || reader.track(name("x")));

        assert_eq!(store.forcer(&name("x")).unwrap().observers(), 1);
        effect.dispose();
        assert!(!store.is_tracked(&name("x")));
    }

    #[test]
    fn notify_reruns_readers() {
        let store = DependencyStore::new();
        let reader = store.clone();
        let effect = Effect::new(move || reader.track(name("x")));

        store.notify(&name("x"));
        store.notify(&name("y"));
        assert_eq!(effect.run_count(), 2);
        assert!(store.is_tracked(&name("x")));
    }

    #[test]
    fn exclusions_block_tracking_until_forced() {
        let store = DependencyStore::new();
        store.exclude(PropertyKey::from("total"));

        let reader = store.clone();
        let _plain = Effect::new(move || reader.track(name("total")));
        assert!(store.is_excluded(&PropertyKey::from("total")));

        let reader = store.clone();
        let _forced = Effect::new(move || reader.track_forced(name("total")));
        assert!(store.is_tracked(&name("total")));
    }

    #[test]
    fn exclusion_does_not_replace_a_cell() {
        let store = DependencyStore::new();
        let reader = store.clone();
        let _effect = Effect::new(move || reader.track(name("x")));
        store.exclude(PropertyKey::from("x"));
        assert!(store.is_tracked(&name("x")));
        assert_eq!(store.tracked_properties(), [PropertyKey::from("x")]);
    }
}
