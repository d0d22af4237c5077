//! Trigger: a reactive source without a value.
//!
//! Reading a trigger (`track`) subscribes the running computation; `notify`
//! invalidates every subscriber. Signals and memo outputs are built on it, and
//! the dependency store uses bare triggers for presence and shape signalling.

use std::rc::Rc;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::SourceId;

struct TriggerInner {
    id: SourceId,
}

impl Drop for TriggerInner {
    fn drop(&mut self) {
        Runtime::remove_source(self.id);
    }
}

/// A value-less reactive source.
#[derive(Clone)]
pub struct Trigger(Rc<TriggerInner>);

impl Trigger {
    /// Create a new trigger.
    pub fn new() -> Self {
        Self(Rc::new(TriggerInner { id: SourceId::new() }))
    }

    /// Get the trigger's source ID.
    pub fn id(&self) -> SourceId {
        self.0.id
    }

    /// Register the running computation, if any, as a dependent.
    pub fn track(&self) {
        ReactiveContext::track_dependency(self.0.id);
    }

    /// Invalidate every dependent.
    pub fn notify(&self) {
        Runtime::notify_source_change(self.0.id);
    }

    /// Number of computations currently depending on this trigger.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.0.id)
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.0.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::cell::Cell;

    #[test]
    fn trigger_reruns_tracking_effect() {
        let trigger = Trigger::new();
        let runs = Rc::new(Cell::new(0));

        let (t, r) = (trigger.clone(), runs.clone());
        let _effect = Effect::new(move || {
            t.track();
            r.set(r.get() + 1);
        });
        assert_eq!(trigger.subscriber_count(), 1);

        trigger.notify();
        trigger.notify();
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn untracked_trigger_has_no_subscribers() {
        let trigger = Trigger::new();
        trigger.track();
        assert_eq!(trigger.subscriber_count(), 0);
        trigger.notify();
    }
}
