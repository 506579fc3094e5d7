//! Stored value model.
//!
//! # Responsibility
//! - Represent every value a content script may persist as one closed enum.
//! - Convert to and from the JSON carried by host messages without failing.
//!
//! # Invariants
//! - `Absent` is the only representation of JSON `null`.
//! - Numbers are kept as `f64`, matching script-side number semantics:
//!   integers re-encode as floats and lose precision beyond 2^53.
//! - Non-finite numbers have no JSON form and are emitted as `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// String-keyed record of stored values.
///
/// Ordered so snapshots and change events are deterministic.
pub type ValueMap = BTreeMap<String, StoredValue>;

/// One value held by a namespaced store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    /// Explicit absence (`null` on the wire).
    Absent,
    Bool(bool),
    Number(f64),
    String(String),
    /// Ordered list of values.
    List(Vec<StoredValue>),
    /// Nested record, e.g. the seeded `options` object.
    Record(ValueMap),
}

impl StoredValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&ValueMap> {
        match self {
            Self::Record(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Converts into the JSON shape dispatched to scripts.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Absent => Value::Null,
            Self::Bool(value) => Value::Bool(*value),
            Self::Number(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            Self::String(value) => Value::String(value.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Record(entries) => value_map_to_json(entries),
        }
    }
}

/// Converts a record into a JSON object.
pub fn value_map_to_json(entries: &ValueMap) -> Value {
    let object = entries
        .iter()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect::<Map<String, Value>>();
    Value::Object(object)
}

/// Converts a JSON object into a record.
pub fn value_map_from_json(object: &Map<String, Value>) -> ValueMap {
    object
        .iter()
        .map(|(key, value)| (key.clone(), StoredValue::from(value)))
        .collect()
}

impl From<&Value> for StoredValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => number.as_f64().map_or(Self::Absent, Self::Number),
            Value::String(text) => Self::String(text.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            Value::Object(object) => Self::Record(value_map_from_json(object)),
        }
    }
}

impl From<Value> for StoredValue {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

impl From<bool> for StoredValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<ValueMap> for StoredValue {
    fn from(value: ValueMap) -> Self {
        Self::Record(value)
    }
}
