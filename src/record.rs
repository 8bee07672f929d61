//! Plain record and sequence kinds.
//!
//! [`Record`] is a wrapper around [`IndexMap`] that keeps insertion order for
//! its fields, and [`Sequence`] is an ordered list of values. Both are
//! pre-registered with the empty origin and no discriminator, and share a
//! single codec.
//!
//! Field order matters: it is the order fields are written to the stream, so
//! a record always reconstructs with the same iteration order.
//!
//! ## Examples
//!
//! ```rust
//! use cachegraph::{Record, Value};
//!
//! let mut record = Record::new();
//! record.insert("name".to_string(), Value::from("Alice"));
//! record.insert("age".to_string(), Value::from(30));
//!
//! assert_eq!(record.len(), 2);
//! assert_eq!(record.get("name").and_then(|v| v.as_str()), Some("Alice"));
//! ```

use crate::Value;
use indexmap::IndexMap;
use std::collections::HashMap;

/// An ordered map of string keys to values.
///
/// # Examples
///
/// ```rust
/// use cachegraph::{Record, Value};
///
/// let mut record = Record::new();
/// record.insert("first".to_string(), Value::from(1));
/// record.insert("second".to_string(), Value::from(2));
///
/// // Iteration maintains insertion order
/// let keys: Vec<_> = record.keys().cloned().collect();
/// assert_eq!(keys, vec!["first", "second"]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record(IndexMap<String, Value>);

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Record(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Record(IndexMap::with_capacity(capacity))
    }

    /// Inserts a field.
    ///
    /// If the record already contained this key, the old value is returned
    /// and the field keeps its original position.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::{Record, Value};
    ///
    /// let mut record = Record::new();
    /// assert!(record.insert("key".to_string(), Value::from(42)).is_none());
    /// assert!(record.insert("key".to_string(), Value::from(43)).is_some());
    /// ```
    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.0.insert(key, value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the keys, in insertion order.
    pub fn keys(&self) -> indexmap::map::Keys<'_, String, Value> {
        self.0.keys()
    }

    /// Returns an iterator over the values, in insertion order.
    pub fn values(&self) -> indexmap::map::Values<'_, String, Value> {
        self.0.values()
    }

    /// Returns an iterator over the fields, in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl From<HashMap<String, Value>> for Record {
    fn from(map: HashMap<String, Value>) -> Self {
        Record(map.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Record(IndexMap::from_iter(iter))
    }
}

/// An ordered list of values.
///
/// # Examples
///
/// ```rust
/// use cachegraph::{Sequence, Value};
///
/// let sequence: Sequence = vec![Value::from(1), Value::from("two")].into();
/// assert_eq!(sequence.len(), 2);
/// assert_eq!(sequence.get(1).and_then(|v| v.as_str()), Some("two"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence(Vec<Value>);

impl Sequence {
    #[must_use]
    pub fn new() -> Self {
        Sequence(Vec::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Sequence(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for Sequence {
    fn from(items: Vec<Value>) -> Self {
        Sequence(items)
    }
}

impl From<Sequence> for Vec<Value> {
    fn from(sequence: Sequence) -> Self {
        sequence.0
    }
}

impl IntoIterator for Sequence {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Value> for Sequence {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Sequence(Vec::from_iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reinsert_keeps_position() {
        let mut record = Record::new();
        record.insert("a".to_string(), Value::from(1));
        record.insert("b".to_string(), Value::from(2));
        record.insert("a".to_string(), Value::from(3));

        let fields: Vec<_> = record.iter().map(|(k, v)| (k.as_str(), v.as_i64())).collect();
        assert_eq!(fields, vec![("a", Some(3)), ("b", Some(2))]);
    }

    #[test]
    fn test_sequence_collect() {
        let sequence: Sequence = (1..=3).map(Value::from).collect();
        assert_eq!(sequence.len(), 3);
        assert_eq!(Vec::from(sequence)[2], Value::from(3));
    }
}
