//! Generic collection algorithms.
//!
//! Every algorithm is written against the primitive operations (`get`, `put`,
//! `has`, `remove`, `length`), so it behaves the same on a plain array and on
//! a facade. On a facade the whole algorithm runs inside the policy's
//! `mutate` hook, which is where notifications are coalesced.

use std::cmp::Ordering;

use super::{Object, PropertyKey, Value};
use crate::error::{Result, StoreError};
use crate::reactive::untrack;

/// A multi-step collection operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
    Reverse,
    Fill,
    Sort,
    CopyWithin,
}

impl Mutation {
    /// Operations that insert or remove elements.
    pub fn resizes(self) -> bool {
        matches!(
            self,
            Mutation::Push | Mutation::Pop | Mutation::Shift | Mutation::Unshift | Mutation::Splice
        )
    }
}

/// Clamp a relative position (negative counts from the end) into `0..=len`.
fn relative(pos: i64, len: u32) -> u32 {
    let len = i64::from(len);
    let pos = if pos < 0 { (len + pos).max(0) } else { pos.min(len) };
    pos as u32
}

/// `len + extra`, or a range error past the maximum length.
fn grown(len: u32, extra: usize) -> Result<u32> {
    u32::try_from(extra)
        .ok()
        .and_then(|extra| len.checked_add(extra))
        .ok_or_else(|| StoreError::Range("invalid array length".into()))
}

impl Object {
    /// Run `f` as one collection operation.
    pub(crate) fn mutate<R>(&self, op: Mutation, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let Some(facade) = self.as_facade() else {
            return f();
        };
        let mut f = Some(f);
        let mut out = None;
        // The algorithm's own reads are not dependencies of the caller.
        untrack(|| {
            facade.policy().mutate(&facade, op, &mut || {
                let f = f
                    .take()
                    .ok_or_else(|| StoreError::Type(format!("{op:?} applied twice")))?;
                out = Some(f()?);
                Ok(())
            })
        })?;
        out.ok_or_else(|| StoreError::Type(format!("{op:?} was not applied")))
    }

    /// The `length` property as an index bound.
    pub fn len(&self) -> Result<u32> {
        let length = self.get(PropertyKey::length())?;
        Ok(match length.as_number() {
            Some(n) if n.is_finite() && n > 0.0 => n.min(f64::from(u32::MAX)) as u32,
            _ => 0,
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Elements `0..len`, holes read as undefined.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        (0..self.len()?).map(|i| self.get(i)).collect()
    }

    fn set_len(&self, len: u32) -> Result<()> {
        self.put(PropertyKey::length(), len)
    }

    /// Move the element at `from` to `to`, carrying holes along.
    fn move_index(&self, from: u32, to: u32) -> Result<()> {
        if self.has(from) {
            let value = self.get(from)?;
            self.put(to, value)
        } else {
            self.remove(to)
        }
    }

    /// Append `items`, returning the new length.
    pub fn push<V: Into<Value>>(&self, items: impl IntoIterator<Item = V>) -> Result<u32> {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.mutate(Mutation::Push, || {
            let len = self.len()?;
            let new_len = grown(len, items.len())?;
            for (i, item) in (len..new_len).zip(items) {
                self.put(i, item)?;
            }
            self.set_len(new_len)?;
            Ok(new_len)
        })
    }

    pub fn pop(&self) -> Result<Value> {
        self.mutate(Mutation::Pop, || {
            let len = self.len()?;
            if len == 0 {
                self.set_len(0)?;
                return Ok(Value::Undefined);
            }
            let last = len - 1;
            let value = self.get(last)?;
            self.remove(last)?;
            self.set_len(last)?;
            Ok(value)
        })
    }

    pub fn shift(&self) -> Result<Value> {
        self.mutate(Mutation::Shift, || {
            let len = self.len()?;
            if len == 0 {
                self.set_len(0)?;
                return Ok(Value::Undefined);
            }
            let first = self.get(0u32)?;
            for k in 1..len {
                self.move_index(k, k - 1)?;
            }
            self.remove(len - 1)?;
            self.set_len(len - 1)?;
            Ok(first)
        })
    }

    /// Prepend `items`, returning the new length.
    pub fn unshift<V: Into<Value>>(&self, items: impl IntoIterator<Item = V>) -> Result<u32> {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.mutate(Mutation::Unshift, || {
            let len = self.len()?;
            let new_len = grown(len, items.len())?;
            let count = new_len - len;
            if count > 0 {
                for k in (0..len).rev() {
                    self.move_index(k, k + count)?;
                }
                for (i, item) in items.into_iter().enumerate() {
                    self.put(i as u32, item)?;
                }
            }
            self.set_len(new_len)?;
            Ok(new_len)
        })
    }

    /// Remove `delete_count` elements at `start` (all remaining when `None`)
    /// and insert `items` in their place. Returns the removed elements.
    pub fn splice<V: Into<Value>>(
        &self,
        start: i64,
        delete_count: Option<u32>,
        items: impl IntoIterator<Item = V>,
    ) -> Result<Vec<Value>> {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.mutate(Mutation::Splice, || {
            let len = self.len()?;
            let start = relative(start, len);
            let deleted = delete_count.map_or(len - start, |n| n.min(len - start));
            let new_len = grown(len - deleted, items.len())?;
            let inserted = new_len - (len - deleted);

            let mut removed = Vec::with_capacity(deleted as usize);
            for k in 0..deleted {
                removed.push(self.get(start + k)?);
            }

            if inserted < deleted {
                for k in start..len - deleted {
                    self.move_index(k + deleted, k + inserted)?;
                }
                for k in (len - deleted + inserted..len).rev() {
                    self.remove(k)?;
                }
            } else if inserted > deleted {
                for k in (start..len - deleted).rev() {
                    self.move_index(k + deleted, k + inserted)?;
                }
            }

            for (i, item) in items.into_iter().enumerate() {
                self.put(start + i as u32, item)?;
            }
            self.set_len(new_len)?;
            Ok(removed)
        })
    }

    pub fn reverse(&self) -> Result<()> {
        self.mutate(Mutation::Reverse, || {
            let len = self.len()?;
            let (mut lower, mut upper) = (0u32, len.saturating_sub(1));
            while lower < upper {
                let lower_value = self.has(lower).then(|| self.get(lower)).transpose()?;
                let upper_value = self.has(upper).then(|| self.get(upper)).transpose()?;
                match upper_value {
                    Some(value) => self.put(lower, value)?,
                    None => self.remove(lower)?,
                }
                match lower_value {
                    Some(value) => self.put(upper, value)?,
                    None => self.remove(upper)?,
                }
                lower += 1;
                upper -= 1;
            }
            Ok(())
        })
    }

    /// Write `value` into `start..end` (relative positions).
    pub fn fill(&self, value: impl Into<Value>, start: i64, end: Option<i64>) -> Result<()> {
        let value = value.into();
        self.mutate(Mutation::Fill, || {
            let len = self.len()?;
            let from = relative(start, len);
            let to = end.map_or(len, |end| relative(end, len));
            for k in from..to {
                self.put(k, value.clone())?;
            }
            Ok(())
        })
    }

    /// Sort by string form, undefined last.
    pub fn sort(&self) -> Result<()> {
        self.sort_by(|a, b| a.to_display_string().cmp(&b.to_display_string()))
    }

    /// Stable sort. Undefined elements go last and holes are moved past them.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<()> {
        self.mutate(Mutation::Sort, || {
            let len = self.len()?;
            let mut values = Vec::new();
            let mut undefined = 0u32;
            for k in 0..len {
                if self.has(k) {
                    match self.get(k)? {
                        Value::Undefined => undefined += 1,
                        value => values.push(value),
                    }
                }
            }
            values.sort_by(&mut compare);

            let filled = values.len() as u32;
            for (i, value) in values.into_iter().enumerate() {
                self.put(i as u32, value)?;
            }
            for k in filled..filled + undefined {
                self.put(k, Value::Undefined)?;
            }
            for k in filled + undefined..len {
                self.remove(k)?;
            }
            Ok(())
        })
    }

    /// Copy `start..end` to `target` within the collection, as if through a
    /// temporary buffer.
    pub fn copy_within(&self, target: i64, start: i64, end: Option<i64>) -> Result<()> {
        self.mutate(Mutation::CopyWithin, || {
            let len = self.len()?;
            let to = relative(target, len);
            let from = relative(start, len);
            let last = end.map_or(len, |end| relative(end, len));
            let count = last.saturating_sub(from).min(len - to);
            if from < to && to < from + count {
                for k in (0..count).rev() {
                    self.move_index(from + k, to + k)?;
                }
            } else {
                for k in 0..count {
                    self.move_index(from + k, to + k)?;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(arr: &Object) -> Vec<f64> {
        arr.to_vec()
            .unwrap()
            .iter()
            .map(|v| v.as_number().unwrap_or(f64::NAN))
            .collect()
    }

    #[test]
    fn push_and_pop() {
        let arr = Object::array();
        assert_eq!(arr.push([1, 2, 3]).unwrap(), 3);
        assert_eq!(arr.pop().unwrap(), Value::from(3));
        assert_eq!(numbers(&arr), [1.0, 2.0]);
        assert_eq!(Object::array().pop().unwrap(), Value::Undefined);
    }

    #[test]
    fn shift_and_unshift() {
        let arr = Object::from_values([2, 3]);
        assert_eq!(arr.unshift([0, 1]).unwrap(), 4);
        assert_eq!(arr.shift().unwrap(), Value::from(0));
        assert_eq!(numbers(&arr), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn splice_replaces_in_place() {
        let arr = Object::from_values([1, 2, 3, 4]);
        let removed = arr.splice(0, Some(3), ["a", "b", "c"]).unwrap();
        assert_eq!(removed, [Value::from(1), Value::from(2), Value::from(3)]);
        assert_eq!(
            arr.to_vec().unwrap(),
            [Value::from("a"), Value::from("b"), Value::from("c"), Value::from(4)]
        );
        assert_eq!(arr.len().unwrap(), 4);
    }

    #[test]
    fn splice_grows_and_shrinks() {
        let arr = Object::from_values([1, 2, 3, 4]);
        arr.splice(0, Some(2), ["a", "b", "c"]).unwrap();
        assert_eq!(arr.len().unwrap(), 5);
        assert_eq!(arr.get(3u32).unwrap(), Value::from(3));

        arr.splice(-2, None, Vec::<Value>::new()).unwrap();
        assert_eq!(arr.len().unwrap(), 3);
        assert!(!arr.has(3u32));
    }

    #[test]
    fn reverse_and_fill() {
        let arr = Object::from_values([1, 2, 3]);
        arr.reverse().unwrap();
        assert_eq!(numbers(&arr), [3.0, 2.0, 1.0]);
        arr.fill(0, 1, None).unwrap();
        assert_eq!(numbers(&arr), [3.0, 0.0, 0.0]);
    }

    #[test]
    fn sort_puts_undefined_last() {
        let arr = Object::from_values([Value::from(10), Value::Undefined, Value::from(9)]);
        arr.sort().unwrap();
        assert_eq!(
            arr.to_vec().unwrap(),
            [Value::from(10), Value::from(9), Value::Undefined]
        );
        arr.sort_by(|a, b| {
            let (a, b) = (a.as_number().unwrap(), b.as_number().unwrap());
            a.total_cmp(&b)
        })
        .unwrap();
        assert_eq!(arr.get(0u32).unwrap(), Value::from(9));
    }

    #[test]
    fn copy_within_overlapping() {
        let arr = Object::from_values([1, 2, 3, 4, 5]);
        arr.copy_within(1, 0, Some(3)).unwrap();
        assert_eq!(numbers(&arr), [1.0, 1.0, 2.0, 3.0, 5.0]);
    }

    #[test]
    fn growing_past_max_length_is_a_range_error() {
        let arr = Object::array();
        arr.put(PropertyKey::length(), u32::MAX).unwrap();

        assert!(matches!(arr.push([1]), Err(StoreError::Range(_))));
        assert!(matches!(arr.unshift([1]), Err(StoreError::Range(_))));
        assert!(matches!(
            arr.splice(0, Some(0), [1]),
            Err(StoreError::Range(_))
        ));
        assert_eq!(arr.len().unwrap(), u32::MAX);
    }

    #[test]
    fn max_u32_key_is_an_ordinary_property() {
        let arr = Object::array();
        arr.put(u32::MAX, 1).unwrap();
        assert_eq!(arr.len().unwrap(), 0);
        assert_eq!(arr.get(u32::MAX).unwrap(), Value::from(1));
    }

    #[test]
    fn resizing_operations() {
        assert!(Mutation::Splice.resizes());
        assert!(!Mutation::Sort.resizes());
    }
}
