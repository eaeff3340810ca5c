//! Record values: the tree shape the canonical encoder accepts.
//!
//! Leaves are null, booleans, integers, and text. Maps are kept as ordered
//! key/value pairs so that duplicate and non-string keys are representable
//! and rejected at encode time rather than silently collapsed.
//!
//! Floats never enter this tree: conversions from JSON fail with
//! `InvalidScalar` so quantization stays the producer's responsibility.

use serde_json::Value as JsonValue;

use crate::error::CanonicalError;

/// A record value.
///
/// Integers are carried as `i128` internally so the full span
/// `[i64::MIN, u64::MAX]` fits in one variant; the canonical encoder
/// rejects anything outside that range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i128),
    Text(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Text value from anything string-like.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Integer value.
    pub fn int(n: i64) -> Self {
        Self::Int(n as i128)
    }

    /// Unsigned integer value.
    pub fn uint(n: u64) -> Self {
        Self::Int(n as i128)
    }

    /// Look up a key in a map value.
    ///
    /// Returns `None` for non-maps and missing keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k, Value::Text(s) if s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Convert from a parsed JSON tree.
    ///
    /// Fails with `InvalidScalar` on any float; object keys arrive in
    /// `serde_json`'s map order.
    pub fn from_json(json: &JsonValue) -> Result<Self, CanonicalError> {
        match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i as i128))
                } else if let Some(u) = n.as_u64() {
                    Ok(Value::Int(u as i128))
                } else {
                    Err(CanonicalError::InvalidScalar(n.to_string()))
                }
            }
            JsonValue::String(s) => Ok(Value::Text(s.clone())),
            JsonValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(Self::from_json(item)?);
                }
                Ok(Value::Array(out))
            }
            JsonValue::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (k, v) in map {
                    entries.push((Value::Text(k.clone()), Self::from_json(v)?));
                }
                Ok(Value::Map(entries))
            }
        }
    }

    /// Convert to a JSON tree for transport or storage framing.
    ///
    /// Fails on out-of-range integers, non-string keys, and duplicate keys,
    /// mirroring the canonical encoder's checks.
    pub fn to_json(&self) -> Result<JsonValue, CanonicalError> {
        match self {
            Value::Null => Ok(JsonValue::Null),
            Value::Bool(b) => Ok(JsonValue::Bool(*b)),
            Value::Int(n) => {
                if let Ok(i) = i64::try_from(*n) {
                    Ok(JsonValue::from(i))
                } else if let Ok(u) = u64::try_from(*n) {
                    Ok(JsonValue::from(u))
                } else {
                    Err(CanonicalError::InvalidScalar(n.to_string()))
                }
            }
            Value::Text(s) => Ok(JsonValue::String(s.clone())),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.to_json()?);
                }
                Ok(JsonValue::Array(out))
            }
            Value::Map(entries) => {
                let mut out = serde_json::Map::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = match k {
                        Value::Text(s) => s.clone(),
                        _ => return Err(CanonicalError::NonStringKey),
                    };
                    if out.contains_key(&key) {
                        return Err(CanonicalError::DuplicateKey(key));
                    }
                    out.insert(key, v.to_json()?);
                }
                Ok(JsonValue::Object(out))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n as i128)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Int(n as i128)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_rejects_floats() {
        let json: JsonValue = serde_json::from_str(r#"{"speed": 3.14}"#).unwrap();
        let result = Value::from_json(&json);
        assert!(matches!(result, Err(CanonicalError::InvalidScalar(_))));
    }

    #[test]
    fn test_from_json_u64_max() {
        let json: JsonValue = serde_json::from_str("18446744073709551615").unwrap();
        let value = Value::from_json(&json).unwrap();
        assert_eq!(value.as_int(), Some(u64::MAX as i128));
    }

    #[test]
    fn test_json_roundtrip() {
        let json: JsonValue =
            serde_json::from_str(r#"{"a":[1,2,{"b":null}],"c":true,"d":"x"}"#).unwrap();
        let value = Value::from_json(&json).unwrap();
        assert_eq!(value.to_json().unwrap(), json);
    }

    #[test]
    fn test_get_on_map() {
        let value = Value::Map(vec![
            (Value::text("tick"), Value::int(7)),
            (Value::text("name"), Value::text("acme")),
        ]);
        assert_eq!(value.get("tick").and_then(Value::as_int), Some(7));
        assert_eq!(value.get("name").and_then(Value::as_str), Some("acme"));
        assert!(value.get("missing").is_none());
    }

    #[test]
    fn test_to_json_rejects_non_string_key() {
        let value = Value::Map(vec![(Value::int(1), Value::int(2))]);
        assert!(matches!(value.to_json(), Err(CanonicalError::NonStringKey)));
    }

    #[test]
    fn test_to_json_rejects_duplicate_key() {
        let value = Value::Map(vec![
            (Value::text("k"), Value::int(1)),
            (Value::text("k"), Value::int(2)),
        ]);
        assert!(matches!(
            value.to_json(),
            Err(CanonicalError::DuplicateKey(_))
        ));
    }
}
