//! Store configuration.
//!
//! Selects the policy stack, the comparator and the circular-getter fallback
//! for facades created with [`wrap_with`](crate::facade::wrap_with).
//!
//! ```json
//! { "policy": "memoized", "comparison": "same_value", "on_circular": { "fallback": 0 } }
//! ```

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::facade::{Collection, Lifecycle, Memoizing, OnCircular, Policy, Tracking};
use crate::object::{default_comparator, same_value, Comparator, Value};

/// Which layers a facade gets. Each level includes the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Tracking,
    Lifecycle,
    Memoized,
    Collection,
}

/// How writes are compared against the previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// NaN equals NaN, +0 equals -0.
    #[default]
    SameValueZero,
    /// NaN equals NaN, +0 differs from -0.
    SameValue,
    /// Every write counts as a change.
    Always,
}

impl Comparison {
    pub fn comparator(self) -> Comparator {
        match self {
            Comparison::SameValueZero => default_comparator(),
            Comparison::SameValue => Rc::new(same_value),
            Comparison::Always => Rc::new(|_: &Value, _: &Value| false),
        }
    }
}

/// Circular-getter handling as written in configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircularSetting {
    #[default]
    Fail,
    Fallback(serde_json::Value),
}

impl From<&CircularSetting> for OnCircular {
    fn from(setting: &CircularSetting) -> Self {
        match setting {
            CircularSetting::Fail => OnCircular::Fail,
            CircularSetting::Fallback(json) => OnCircular::Return(Value::from(json.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub policy: PolicyKind,
    pub comparison: Comparison,
    pub on_circular: CircularSetting,
}

impl StoreConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| StoreError::Config(err.to_string()))
    }

    /// Build the configured policy stack.
    pub fn build(&self) -> Rc<dyn Policy> {
        let tracking = Tracking::new(self.comparison.comparator());
        match self.policy {
            PolicyKind::Tracking => Rc::new(tracking),
            PolicyKind::Lifecycle => Rc::new(Lifecycle::new(tracking)),
            PolicyKind::Memoized => Rc::new(self.memoizing(tracking)),
            PolicyKind::Collection => Rc::new(Collection::new(self.memoizing(tracking))),
        }
    }

    fn memoizing(&self, tracking: Tracking) -> Memoizing {
        Memoizing::new(Lifecycle::new(tracking), OnCircular::from(&self.on_circular))
    }
}
