//! Conversions used by field setters to turn a stored [`Value`] back into a
//! Rust field.
//!
//! Every function accepts [`Value::Null`] only where the target type can
//! represent absence (see [`optional`]).

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{FieldError, Result};
use crate::value::Value;

fn mismatch(expected: &'static str, found: &Value) -> FieldError {
    FieldError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

pub fn string(value: Value) -> Result<String> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(mismatch("string", &other)),
    }
}

pub fn int(value: Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(i),
        // Stores without an integer type hand back whole floats.
        Value::Float(f) if f.fract() == 0.0 => Ok(f as i64),
        other => Err(mismatch("int", &other)),
    }
}

pub fn float(value: Value) -> Result<f64> {
    match value {
        Value::Float(f) => Ok(f),
        Value::Int(i) => Ok(i as f64),
        other => Err(mismatch("float", &other)),
    }
}

pub fn boolean(value: Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(mismatch("bool", &other)),
    }
}

pub fn bytes(value: Value) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b),
        other => Err(mismatch("bytes", &other)),
    }
}

/// Maps `Null` to `None` and everything else through `inner`.
pub fn optional<T>(value: Value, inner: impl FnOnce(Value) -> Result<T>) -> Result<Option<T>> {
    match value {
        Value::Null => Ok(None),
        other => inner(other).map(Some),
    }
}

/// Decodes a nested structure, list or map field.
pub fn structured<T: DeserializeOwned>(value: Value) -> Result<T> {
    value
        .deserialize_into()
        .map_err(|e| FieldError::Structured(e.to_string()))
}

/// Encodes a nested structure, list or map field.
///
/// A value that cannot be represented is stored as `Null`; getters cannot fail.
pub fn to_structured<T: Serialize>(value: &T) -> Value {
    Value::from_serialize(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_int_accepts_whole_floats() {
        assert_eq!(int(Value::Float(42.0)), Ok(42));
        assert!(int(Value::Float(4.2)).is_err());
    }

    #[test]
    fn test_string_rejects_numbers() {
        assert_eq!(
            string(Value::Int(1)),
            Err(FieldError::TypeMismatch {
                expected: "string",
                found: "int"
            })
        );
    }

    #[test]
    fn test_optional_maps_null_to_none() {
        assert_eq!(optional(Value::Null, string), Ok(None));
        assert_eq!(
            optional(Value::from("x"), string),
            Ok(Some("x".to_string()))
        );
    }

    #[test]
    fn test_structured_round_trips_a_map() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1i64);
        map.insert("b".to_string(), 2i64);

        let value = to_structured(&map);
        let back: BTreeMap<String, i64> = structured(value).unwrap();
        assert_eq!(back, map);
    }
}
