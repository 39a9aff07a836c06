use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Generic runtime value type for record fields.
///
/// Supports all JSON-compatible types plus binary data. Records carry their
/// domain fields as `Value`s so the storage layers never need to know the
/// concrete domain type.
///
/// Serializes to `MsgPack` via `rmp-serde` when written to a durable backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// JSON null.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// Binary data (not directly representable in JSON).
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    /// JSON array (ordered sequence of values).
    Array(Vec<Value>),
    /// JSON object (ordered map of string keys to values).
    /// Uses `BTreeMap` for deterministic serialization order.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Rank used to order values of different kinds. Numbers share a rank so
    /// that `Int` and `Float` compare numerically.
    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Bytes(_) => 4,
            Value::Array(_) => 5,
            Value::Map(_) => 6,
        }
    }

    /// Total order over values, used for sorting and range predicates.
    ///
    /// Values of different kinds order by kind (`Null` first, `Map` last).
    /// Integers and floats compare numerically; floats use IEEE total order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b) {
                    let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(bytes) => serde_json::Value::Array(
                bytes.iter().map(|b| serde_json::Value::from(*b)).collect(),
            ),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Discriminant for the kind of durable backend behind a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreKind {
    /// Purely in-memory: nothing survives the process, no engine-level bulk operations.
    InMemory,
    /// Backed by an on-disk database.
    Durable,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::InMemory => f.write_str("in-memory"),
            StoreKind::Durable => f.write_str("durable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Storage-native representation of one persisted entity instance.
///
/// `entity` names the record type, `key` is the immutable primary key and
/// `version` is the optimistic-concurrency ordinal. Everything else lives in
/// `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub entity: String,
    pub key: String,
    pub version: u64,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Pseudo-attribute addressing the primary key in predicates and sorts.
    pub const KEY_ATTRIBUTE: &'static str = "$key";
    /// Pseudo-attribute addressing the version in predicates and sorts.
    pub const VERSION_ATTRIBUTE: &'static str = "$version";

    /// Creates an empty record at version 1.
    #[must_use]
    pub fn new(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            key: key.into(),
            version: 1,
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a domain field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Resolves an attribute for predicate evaluation and sorting.
    ///
    /// Domain fields win over the `$key`/`$version` pseudo-attributes.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.fields.get(name) {
            return Some(value.clone());
        }
        match name {
            Self::KEY_ATTRIBUTE => Some(Value::String(self.key.clone())),
            Self::VERSION_ATTRIBUTE => i64::try_from(self.version).ok().map(Value::Int),
            _ => None,
        }
    }

    /// Replaces this record's domain fields with those of `edited`.
    ///
    /// Key, entity and version are left alone.
    pub fn merge_fields_from(&mut self, edited: &Record) {
        self.fields.clone_from(&edited.fields);
    }

    /// Encodes the record as `MsgPack` with named fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a field cannot be serialized.
    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    /// Decodes a record previously produced by [`Record::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoded record.
    pub fn decode(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_int_and_float() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Float(3.0).compare(&Value::Int(3)), Ordering::Equal);
        assert_eq!(Value::Int(10).compare(&Value::Int(9)), Ordering::Greater);
    }

    #[test]
    fn different_kinds_order_by_rank() {
        assert_eq!(Value::Null.compare(&Value::Bool(false)), Ordering::Less);
        assert_eq!(
            Value::String("a".into()).compare(&Value::Int(100)),
            Ordering::Greater
        );
    }

    #[test]
    fn arrays_compare_lexicographically() {
        let a = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::Array(vec![Value::Int(1), Value::Int(3)]);
        let c = Value::Array(vec![Value::Int(1)]);
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(c.compare(&a), Ordering::Less);
    }

    #[test]
    fn attribute_resolves_pseudo_fields() {
        let record = Record::new("user", "u-1")
            .with_version(7)
            .with_field("name", "Ada");

        assert_eq!(record.attribute("name"), Some(Value::String("Ada".into())));
        assert_eq!(
            record.attribute(Record::KEY_ATTRIBUTE),
            Some(Value::String("u-1".into()))
        );
        assert_eq!(record.attribute(Record::VERSION_ATTRIBUTE), Some(Value::Int(7)));
        assert_eq!(record.attribute("missing"), None);
    }

    #[test]
    fn merge_fields_keeps_identity_and_version() {
        let mut original = Record::new("user", "u-1")
            .with_version(3)
            .with_field("name", "Ada")
            .with_field("age", 36);
        let edited = Record::new("user", "u-1")
            .with_version(9)
            .with_field("name", "Ada L.");

        original.merge_fields_from(&edited);

        assert_eq!(original.key, "u-1");
        assert_eq!(original.version, 3);
        assert_eq!(original.field("name"), Some(&Value::String("Ada L.".into())));
        assert_eq!(original.field("age"), None);
    }

    #[test]
    fn record_msgpack_encoding_preserves_bytes_field() {
        let record = Record::new("blob", "b-1").with_field("payload", vec![0_u8, 1, 255]);
        let bytes = record.encode().unwrap();
        let decoded = Record::decode(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn json_conversion_maps_numbers_and_objects() {
        let json = serde_json::json!({"id": 4, "score": 1.5, "tags": ["a"], "none": null});
        let value = Value::from(json.clone());
        let Value::Map(map) = &value else {
            panic!("expected map");
        };
        assert_eq!(map.get("id"), Some(&Value::Int(4)));
        assert_eq!(map.get("score"), Some(&Value::Float(1.5)));
        assert_eq!(serde_json::Value::from(&value), json);
    }

    #[test]
    fn option_into_value_maps_none_to_null() {
        let none: Option<i64> = None;
        assert!(Value::from(none).is_null());
        assert_eq!(Value::from(Some(5_i64)), Value::Int(5));
    }
}
