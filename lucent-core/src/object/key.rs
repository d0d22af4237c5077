//! Property keys.

use std::fmt;
use std::rc::Rc;

/// A property key: a canonical collection index or a name.
///
/// Strings that spell a canonical index (`"0"`, `"17"`, but not `"01"`)
/// become [`PropertyKey::Index`], so `"3"` and `3u32` name the same property.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    Index(u32),
    Name(Rc<str>),
}

impl PropertyKey {
    /// The `length` key of ordered collections.
    pub fn length() -> Self {
        PropertyKey::Name(Rc::from("length"))
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            PropertyKey::Name(_) => None,
        }
    }

    pub fn is_length(&self) -> bool {
        matches!(self, PropertyKey::Name(name) if &**name == "length")
    }
}

fn canonical_index(s: &str) -> Option<u32> {
    let n: u32 = s.parse().ok()?;
    // u32::MAX is not a valid index; the maximum length is.
    (n != u32::MAX && n.to_string() == s).then_some(n)
}

impl From<&str> for PropertyKey {
    fn from(value: &str) -> Self {
        match canonical_index(value) {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::Name(Rc::from(value)),
        }
    }
}

impl From<String> for PropertyKey {
    fn from(value: String) -> Self {
        PropertyKey::from(value.as_str())
    }
}

impl From<u32> for PropertyKey {
    fn from(value: u32) -> Self {
        if value == u32::MAX {
            PropertyKey::Name(Rc::from(value.to_string()))
        } else {
            PropertyKey::Index(value)
        }
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(value: &PropertyKey) -> Self {
        value.clone()
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Index(i) => write!(f, "{i}"),
            PropertyKey::Name(name) => f.write_str(name),
        }
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Index(i) => write!(f, "{i}"),
            PropertyKey::Name(name) => write!(f, "{name:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_numbers_are_indices() {
        assert_eq!(PropertyKey::from("3"), PropertyKey::Index(3));
        assert_eq!(PropertyKey::from("03"), PropertyKey::Name(Rc::from("03")));
        assert_eq!(PropertyKey::from("-1"), PropertyKey::Name(Rc::from("-1")));
        assert!(PropertyKey::from("length").is_length());
    }

    #[test]
    fn max_u32_is_a_name() {
        let key = PropertyKey::from(u32::MAX.to_string());
        assert!(key.as_index().is_none());
        assert_eq!(PropertyKey::from(u32::MAX), key);
        assert_eq!(PropertyKey::from(u32::MAX - 1).as_index(), Some(u32::MAX - 1));
    }
}
