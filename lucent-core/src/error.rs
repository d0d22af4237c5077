//! Error taxonomy.
//!
//! Only two errors originate in this crate's own logic: `NotAttached` and
//! `CircularGetter`. The rest mirror the default semantics of the object
//! model (strict writes that fail, invalid lengths) or carry failures raised
//! by user getters and setters unchanged.

use thiserror::Error;

use crate::object::PropertyKey;

/// Errors raised by object operations and the facade layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// A raw-object/facade lookup hit an object that was never wrapped.
    #[error("object is not attached to a facade")]
    NotAttached,

    /// A memoized getter read itself before its first value was established.
    #[error("getter `{key}` read itself before its first value was established")]
    CircularGetter { key: PropertyKey },

    /// An operation the object's default semantics reject.
    #[error("type error: {0}")]
    Type(String),

    /// A numeric argument outside its valid range.
    #[error("range error: {0}")]
    Range(String),

    /// A failure raised by a user-supplied getter or setter.
    #[error("{0}")]
    Thrown(String),

    /// A store configuration that could not be parsed.
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Build the error a user getter or setter raises.
    pub fn thrown(message: impl Into<String>) -> Self {
        Self::Thrown(message.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_getter_names_the_property() {
        let err = StoreError::CircularGetter {
            key: PropertyKey::from("total"),
        };
        assert_eq!(
            err.to_string(),
            "getter `total` read itself before its first value was established"
        );
    }

    #[test]
    fn thrown_keeps_the_message() {
        assert_eq!(StoreError::thrown("boom").to_string(), "boom");
    }
}
