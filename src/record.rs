// src/record.rs
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A field value in a normalized record.
///
/// Serialized untagged, so the cache file reads as plain JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s!(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Source-agnostic item: identity key plus sorted fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub key: String,
    pub fields: BTreeMap<String, Value>,
}

impl NormalizedRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), fields: BTreeMap::new() }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(s!(field), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_json_is_plain() {
        let rec = NormalizedRecord::new("USS Defiant")
            .with("tier", 6.0)
            .with("type", "Escort")
            .with("experimental", true);
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(
            json,
            r#"{"key":"USS Defiant","fields":{"experimental":true,"tier":6.0,"type":"Escort"}}"#
        );
        let back: NormalizedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn nested_values_deserialize() {
        let v: Value = serde_json::from_str(r#"{"icons":[{"src":"a.png"}],"n":3}"#).unwrap();
        let map = v.as_map().unwrap();
        assert_eq!(map["n"].as_f64(), Some(3.0));
        let icons = map["icons"].as_list().unwrap();
        assert_eq!(icons[0].as_map().unwrap()["src"].as_str(), Some("a.png"));
    }
}
