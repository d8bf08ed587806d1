//! Ordered, case-insensitively keyed record type.
//!
//! A `Record` is one row-equivalent entity: a field-name → value mapping
//! with no fixed schema. Field order follows insertion order so a record
//! echoes back to clients in a stable shape. Lookups ignore case because
//! schema-discovered column names and client payload keys routinely
//! disagree on it.

use crate::error::{Error, Result};
use crate::value::Value;

/// One row-equivalent entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Look up a field value, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    /// True if the field is present (even if its value is null).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Set a field value. An existing field keeps its position and its
    /// original key spelling; a new field is appended.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    /// Iterate `(name, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Keep only fields whose name passes the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|(k, _)| keep(k));
    }

    /// Overlay another record's fields onto this one.
    pub fn merge(&mut self, other: &Record) {
        for (k, v) in other.iter() {
            self.set(k, v.clone());
        }
    }

    /// Build a record from a JSON object.
    ///
    /// Anything other than an object is a malformed payload.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = json else {
            return Err(Error::bad_request("record payload must be a JSON object"));
        };
        let mut record = Record::new();
        for (k, v) in map {
            record.set(k.clone(), Value::from_json(v));
        }
        Ok(record)
    }

    /// Serialize to a JSON object. Field order carries through to the
    /// JSON map (`serde_json` runs with `preserve_order`).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.entries.len());
        for (k, v) in &self.entries {
            map.insert(k.clone(), v.to_json());
        }
        serde_json::Value::Object(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

impl<const N: usize> From<[(&str, Value); N]> for Record {
    fn from(pairs: [(&str, Value); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut r = Record::new();
        r.set("UserName", Value::from("alice"));
        assert_eq!(r.get("username").and_then(Value::as_str), Some("alice"));
        assert_eq!(r.get("USERNAME").and_then(Value::as_str), Some("alice"));
        assert!(r.contains("userName"));
        assert!(!r.contains("user_name"));
    }

    #[test]
    fn test_set_preserves_position_and_spelling() {
        let mut r = Record::from([("a", Value::Int(1)), ("b", Value::Int(2))]);
        r.set("A", Value::Int(10));
        let keys: Vec<&str> = r.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(r.get("a"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_remove() {
        let mut r = Record::from([("id", Value::Int(7)), ("name", Value::from("x"))]);
        assert_eq!(r.remove("ID"), Some(Value::Int(7)));
        assert_eq!(r.len(), 1);
        assert_eq!(r.remove("missing"), None);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(Record::from_json(&json!([1, 2])).is_err());
        assert!(Record::from_json(&json!("x")).is_err());
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let r = Record::from([
            ("id", Value::Int(1)),
            ("name", Value::from("widget")),
            ("active", Value::Bool(true)),
        ]);
        let json = r.to_json();
        assert_eq!(
            json.to_string(),
            r#"{"id":1,"name":"widget","active":true}"#
        );
        let back = Record::from_json(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_merge_overlays() {
        let mut base = Record::from([("id", Value::Int(1)), ("name", Value::from("old"))]);
        let patch = Record::from([("name", Value::from("new")), ("extra", Value::Int(9))]);
        base.merge(&patch);
        assert_eq!(base.get("name").and_then(Value::as_str), Some("new"));
        assert_eq!(base.get("extra"), Some(&Value::Int(9)));
        assert_eq!(base.len(), 3);
    }
}
