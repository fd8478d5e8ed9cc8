//! Logical cache payload values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A logical cache payload: scalar, ordered sequence, or mapping.
///
/// Aggregates handled by the transaction API are `Map` values, possibly
/// holding nested `Map` rows. The wire representation is plain JSON; callers
/// never see it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
  List(Vec<Value>),
  Map(BTreeMap<String, Value>),
}

impl Value {
  /// Parse user-supplied input: JSON if it parses, plain text otherwise.
  pub fn parse(s: &str) -> Value {
    serde_json::from_str::<Value>(s).unwrap_or_else(|_| Value::Text(s.to_string()))
  }

  pub fn is_map(&self) -> bool {
    matches!(self, Value::Map(_))
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Map(map) => Some(map),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Value::Int(i) => Some(*i),
      Value::Text(s) => s.parse().ok(),
      _ => None,
    }
  }

  /// True for values an increment/decrement may target.
  pub fn is_numeric(&self) -> bool {
    matches!(self, Value::Int(_) | Value::Float(_))
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Int(i)
  }
}

impl From<f64> for Value {
  fn from(f: f64) -> Self {
    Value::Float(f)
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::Text(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::Text(s)
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::List(items)
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(map: BTreeMap<String, Value>) -> Self {
    Value::Map(map)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_json_first() {
    assert_eq!(Value::parse("5"), Value::Int(5));
    assert_eq!(Value::parse("5.5"), Value::Float(5.5));
    assert_eq!(Value::parse("true"), Value::Bool(true));
    assert_eq!(Value::parse("\"quoted\""), Value::Text("quoted".to_string()));
    assert_eq!(Value::parse("plain text"), Value::Text("plain text".to_string()));
    assert_eq!(
      Value::parse("[1, 2]"),
      Value::List(vec![Value::Int(1), Value::Int(2)])
    );
    assert!(Value::parse(r#"{"count": 1}"#).is_map());
  }

  #[test]
  fn test_scalar_accessors() {
    assert_eq!(Value::Int(7).as_i64(), Some(7));
    assert_eq!(Value::Text("7".to_string()).as_i64(), Some(7));
    assert_eq!(Value::Text("seven".to_string()).as_i64(), None);
    assert_eq!(Value::Null.as_i64(), None);
    assert_eq!(Value::from("abc").as_str(), Some("abc"));
    assert_eq!(Value::Int(1).as_str(), None);
  }

  #[test]
  fn test_nested_aggregate_shape() {
    let value = Value::parse(r#"{"7": {"seeders": 3, "name": "x"}, "9": {"seeders": 0}}"#);
    let rows = value.as_map().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows["7"].is_map());
    assert_eq!(rows["7"].as_map().unwrap()["seeders"], Value::Int(3));
  }
}
