//! Facade ownership scopes.

use crate::object::Comparator;
use crate::reactive::Scope;

use super::policy::Policy;
use super::tracking::Tracking;
use super::Facade;

/// Gives each facade one ownership [`Scope`].
///
/// The scope is created when the facade is initialized and disposed, exactly
/// once, when the facade is. Outer layers register their computations and
/// cleanups under it.
#[derive(Debug, Default)]
pub struct Lifecycle {
    inner: Tracking,
}

impl Lifecycle {
    pub fn new(inner: Tracking) -> Self {
        Self { inner }
    }

    pub fn with_comparator(comparator: Comparator) -> Self {
        Self::new(Tracking::new(comparator))
    }
}

impl Policy for Lifecycle {
    fn name(&self) -> &'static str {
        "lifecycle"
    }

    fn next(&self) -> Option<&dyn Policy> {
        Some(&self.inner)
    }

    fn init(&self, facade: &Facade) {
        self.inner.init(facade);
        let _ = facade.owner_slot().get_or_init(Scope::new);
    }

    fn dispose(&self, facade: &Facade) {
        if let Some(scope) = facade.owner_slot().get() {
            scope.dispose();
        }
        self.inner.dispose(facade);
    }

    fn owner(&self, facade: &Facade) -> Option<Scope> {
        facade.owner_slot().get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::{dispose, get_owner, wrap};
    use crate::object::Object;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn owner_is_created_once() {
        let facade = wrap(&Object::new(), Some(Rc::new(Lifecycle::default())));
        let first = get_owner(&facade).unwrap();
        facade.policy().init(&facade);
        assert!(first.ptr_eq(&get_owner(&facade).unwrap()));
    }

    #[test]
    fn teardown_runs_exactly_once() {
        let facade = wrap(&Object::new(), Some(Rc::new(Lifecycle::default())));
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        get_owner(&facade)
            .unwrap()
            .add_cleanup(move || counter.set(counter.get() + 1));

        dispose(&facade);
        dispose(&facade);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn still_tracks() {
        let facade = wrap(
            &Object::from_entries([("x", 1)]),
            Some(Rc::new(Lifecycle::default())),
        );
        let reader = facade.clone();
        let effect = crate::reactive::Effect::new(move || {
            let _ = reader.get("x");
        });
        facade.put("x", 2).unwrap();
        assert_eq!(effect.run_count(), 2);
    }
}
