//! Resource State Values
//!
//! The attribute map exchanged with the orchestrator as JSON, plus helpers
//! for reading typed attributes out of it and building it back up.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use pvedisk_common::{Error, Result};

/// Dynamic value as exchanged with the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DynamicValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DynamicValue>),
    Map(HashMap<String, DynamicValue>),
}

impl DynamicValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, DynamicValue>> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up an attribute, treating explicit nulls as absent
    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map()?.get(key).filter(|v| !v.is_null())
    }

    /// Set an attribute, turning a null value into an empty map first
    pub fn set(&mut self, key: &str, value: DynamicValue) {
        if self.is_null() {
            *self = DynamicValue::Map(HashMap::new());
        }
        if let DynamicValue::Map(m) = self {
            m.insert(key.to_string(), value);
        }
    }
}

impl Default for DynamicValue {
    fn default() -> Self {
        DynamicValue::Null
    }
}

/// Extract a required, non-empty string attribute
pub fn get_required_string_attr(value: &DynamicValue, key: &str) -> Result<String> {
    match value.get(key) {
        None => Err(Error::MissingAttribute(key.to_string())),
        Some(DynamicValue::String(s)) if s.is_empty() => {
            Err(Error::MissingAttribute(key.to_string()))
        }
        Some(DynamicValue::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::invalid_attribute(key, "expected a string")),
    }
}

/// Helper to extract an optional string attribute; empty strings count as unset
pub fn get_optional_string_attr(value: &DynamicValue, key: &str) -> Option<String> {
    value.get(key)
        .and_then(|v| match v {
            DynamicValue::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
}

/// Helper to extract an optional integer attribute
pub fn get_optional_int_attr(value: &DynamicValue, key: &str) -> Result<Option<i64>> {
    match value.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| Error::invalid_attribute(key, "expected an integer")),
    }
}

/// Helper to extract a bool attribute from a DynamicValue
pub fn get_bool_attr(value: &DynamicValue, key: &str, default: bool) -> bool {
    value.get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

/// Create a DynamicValue map with the given attributes
pub fn make_state(attrs: Vec<(&str, DynamicValue)>) -> DynamicValue {
    let mut map = HashMap::new();
    for (key, value) in attrs {
        map.insert(key.to_string(), value);
    }
    DynamicValue::Map(map)
}

/// Create a string DynamicValue
pub fn string_value(s: impl Into<String>) -> DynamicValue {
    DynamicValue::String(s.into())
}

/// Create a string DynamicValue, or null when absent
pub fn optional_string_value(s: Option<&str>) -> DynamicValue {
    s.map(string_value).unwrap_or(DynamicValue::Null)
}

/// Create a number DynamicValue from i64
pub fn int_value(n: i64) -> DynamicValue {
    DynamicValue::Number(serde_json::Number::from(n))
}

/// Create a number DynamicValue from u64, or null when absent
pub fn optional_uint_value(n: Option<u64>) -> DynamicValue {
    n.map(|n| DynamicValue::Number(serde_json::Number::from(n)))
        .unwrap_or(DynamicValue::Null)
}

/// Create a bool DynamicValue
pub fn bool_value(b: bool) -> DynamicValue {
    DynamicValue::Bool(b)
}
