//! Runtime value type for documents, parameters, and plan literals.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A dynamically-shaped document value.
///
/// Every builder, engine, and normalizer works over this one closed type, so
/// documents read from a driver, literals embedded in a plan, and bind values
/// handed to SQL all share the same representation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered array of values.
    Array(Vec<Value>),
    /// Object with keys in sorted order.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Build an object from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Parse a JSON text into a value.
    pub fn parse(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render as compact JSON text.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is numeric.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int64(_) | Value::Float64(_))
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64. Floats with no fractional part are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Float64(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Try to get as f64, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as array slice.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Try to get as object map.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a direct child of an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Follow a path of object keys. Arrays are not traversed.
    pub fn get_path<'p, I>(&self, path: I) -> Option<&Value>
    where
        I: IntoIterator<Item = &'p str>,
    {
        path.into_iter()
            .try_fold(self, |current, segment| current.get(segment))
    }

    /// Insert `value` at an object path, creating intermediate objects.
    ///
    /// Does nothing when an intermediate segment holds a non-object value.
    pub fn set_path(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return;
        };
        let mut current = self;
        for segment in parents {
            if current.is_null() {
                *current = Value::Object(BTreeMap::new());
            }
            let Value::Object(map) = current else {
                return;
            };
            current = map
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(BTreeMap::new()));
        }
        if current.is_null() {
            *current = Value::Object(BTreeMap::new());
        }
        if let Value::Object(map) = current {
            map.insert((*last).to_string(), value);
        }
    }

    /// Remove and return the value at an object path.
    pub fn take_path(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let mut current = self;
        for segment in parents {
            match current {
                Value::Object(map) => current = map.get_mut(*segment)?,
                _ => return None,
            }
        }
        match current {
            Value::Object(map) => map.remove(*last),
            _ => None,
        }
    }

    /// Equality with numeric widening: `Int64(2)` equals `Float64(2.0)`.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_number() && b.is_number() => {
                a.as_f64().zip(b.as_f64()).is_some_and(|(x, y)| x == y)
            }
            (a, b) => a == b,
        }
    }

    /// Order two values of comparable kinds (numbers with numbers, strings with strings).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (a, b) if a.is_number() && b.is_number() => {
                a.as_f64().zip(b.as_f64()).and_then(|(x, y)| x.partial_cmp(&y))
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Total ordering used for sorting documents: null < numbers < strings < others.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Int64(_) | Value::Float64(_) => 1,
                Value::String(_) => 2,
                Value::Object(_) => 3,
                Value::Array(_) => 4,
                Value::Bool(_) => 5,
            }
        }
        self.compare(other)
            .unwrap_or_else(|| rank(self).cmp(&rank(other)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Float64(v) => write!(f, "{v}"),
            other => write!(f, "{}", other.to_json_string()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int64(i),
                None => Value::Float64(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int64(i) => serde_json::Value::from(*i),
            Value::Float64(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn investor() -> Value {
        Value::object([
            ("_id", Value::from("INV1")),
            (
                "entitlements",
                Value::object([("advisoryContext", Value::from(vec![Value::from("CTX1")]))]),
            ),
            ("partyRoleId", Value::from(42i64)),
        ])
    }

    #[test]
    fn test_get_path() {
        let doc = investor();
        assert_eq!(doc.get_path(["_id"]), Some(&Value::from("INV1")));
        assert_eq!(
            doc.get_path(["entitlements", "advisoryContext"])
                .and_then(Value::as_array)
                .map(<[Value]>::len),
            Some(1)
        );
        assert!(doc.get_path(["entitlements", "missing"]).is_none());
    }

    #[test]
    fn test_set_and_take_path() {
        let mut doc = investor();
        doc.set_path(&["meta", "type"], Value::from("BookRoleInvestor"));
        assert_eq!(
            doc.get_path(["meta", "type"]).and_then(Value::as_str),
            Some("BookRoleInvestor")
        );
        let taken = doc.take_path(&["entitlements", "advisoryContext"]);
        assert!(taken.is_some());
        assert!(doc.get_path(["entitlements", "advisoryContext"]).is_none());
    }

    #[test]
    fn test_json_roundtrip_keeps_numeric_kinds() {
        let parsed = Value::parse(r#"{"a": 2, "b": 2.5, "c": 100.0, "d": [null, true]}"#).unwrap();
        assert_eq!(parsed.get("a"), Some(&Value::Int64(2)));
        assert_eq!(parsed.get("b"), Some(&Value::Float64(2.5)));
        assert_eq!(parsed.get("c"), Some(&Value::Float64(100.0)));
        let text = parsed.to_json_string();
        assert_eq!(Value::parse(&text).unwrap(), parsed);
    }

    #[test]
    fn test_loose_eq_and_compare() {
        assert!(Value::Int64(2).loose_eq(&Value::Float64(2.0)));
        assert!(!Value::from("2").loose_eq(&Value::Int64(2)));
        assert_eq!(
            Value::Float64(100.0).compare(&Value::Float64(100.01)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::from("a").compare(&Value::Int64(1)), None);
        assert_eq!(Value::Null.sort_cmp(&Value::Int64(1)), Ordering::Less);
    }
}
