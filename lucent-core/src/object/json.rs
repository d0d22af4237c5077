//! Conversion between JSON documents and objects.

use serde_json::{Map, Number};

use super::{Object, Value};
use crate::error::{Result, StoreError};

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Object(Object::from_values(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(entries) => Value::Object(Object::from_entries(
                entries.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

impl Value {
    /// Snapshot as JSON, reading through the same operations as any caller.
    ///
    /// Undefined and non-finite numbers become `null`; cyclic structures are
    /// a type error.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        to_json(self, &mut Vec::new())
    }
}

fn number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

fn to_json(value: &Value, path: &mut Vec<Object>) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Undefined | Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number(*n),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Object(object) => {
            if path.iter().any(|seen| Object::ptr_eq(seen, object)) {
                return Err(StoreError::Type("cannot serialize a cyclic structure".into()));
            }
            path.push(object.clone());
            let out = if object.is_array() {
                let items = object
                    .to_vec()?
                    .iter()
                    .map(|item| to_json(item, path))
                    .collect::<Result<Vec<_>>>()?;
                serde_json::Value::Array(items)
            } else {
                let mut map = Map::new();
                for key in object.keys() {
                    let item = object.get(key.clone())?;
                    map.insert(key.to_string(), to_json(&item, path)?);
                }
                serde_json::Value::Object(map)
            };
            path.pop();
            out
        }
    })
}
