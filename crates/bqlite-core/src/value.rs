//! Engine-native values.
//!
//! [`NativeValue`] is the closed set of shapes a result cell or a bound
//! parameter can take before it is coerced into the wire format.

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

/// A value as produced by (or handed to) the embedded engine.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// SQL NULL
    Null,
    /// Boolean (parameters and JSON documents only, the engine stores 0/1)
    Bool(bool),
    /// 64-bit integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    /// Text
    String(String),
    /// Blob
    Bytes(Vec<u8>),
    /// Ordered list
    Array(Vec<NativeValue>),
    /// Ordered name/value pairs
    Object(Vec<(String, NativeValue)>),
}

impl NativeValue {
    /// True for [`NativeValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Text content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Warehouse truthiness: non-zero numbers, `true` and the strings
    /// `"true"`/`"1"` are true.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            NativeValue::Null => None,
            NativeValue::Bool(b) => Some(*b),
            NativeValue::Integer(i) => Some(*i != 0),
            NativeValue::Float(f) => Some(*f != 0.0),
            NativeValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Converts a JSON document into a native value.
    pub fn from_json(value: &serde_json::Value) -> NativeValue {
        match value {
            serde_json::Value::Null => NativeValue::Null,
            serde_json::Value::Bool(b) => NativeValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => NativeValue::Integer(i),
                None => NativeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => NativeValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                NativeValue::Array(items.iter().map(NativeValue::from_json).collect())
            }
            serde_json::Value::Object(map) => NativeValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), NativeValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts into a JSON document. Non-finite floats become `null`, bytes
    /// become lossy UTF-8 text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            NativeValue::Null => serde_json::Value::Null,
            NativeValue::Bool(b) => serde_json::Value::Bool(*b),
            NativeValue::Integer(i) => serde_json::Value::from(*i),
            NativeValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            NativeValue::String(s) => serde_json::Value::String(s.clone()),
            NativeValue::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
            NativeValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(NativeValue::to_json).collect())
            }
            NativeValue::Object(pairs) => serde_json::Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Converts into an engine value; arrays and objects are stored as JSON
    /// text, booleans as 0/1.
    pub fn to_sql_value(&self) -> SqlValue {
        match self {
            NativeValue::Null => SqlValue::Null,
            NativeValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
            NativeValue::Integer(i) => SqlValue::Integer(*i),
            NativeValue::Float(f) => SqlValue::Real(*f),
            NativeValue::String(s) => SqlValue::Text(s.clone()),
            NativeValue::Bytes(b) => SqlValue::Blob(b.clone()),
            NativeValue::Array(_) | NativeValue::Object(_) => {
                SqlValue::Text(self.to_json().to_string())
            }
        }
    }
}

impl From<ValueRef<'_>> for NativeValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => NativeValue::Null,
            ValueRef::Integer(i) => NativeValue::Integer(i),
            ValueRef::Real(f) => NativeValue::Float(f),
            ValueRef::Text(t) => NativeValue::String(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => NativeValue::Bytes(b.to_vec()),
        }
    }
}

impl From<SqlValue> for NativeValue {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => NativeValue::Null,
            SqlValue::Integer(i) => NativeValue::Integer(i),
            SqlValue::Real(f) => NativeValue::Float(f),
            SqlValue::Text(s) => NativeValue::String(s),
            SqlValue::Blob(b) => NativeValue::Bytes(b),
        }
    }
}

impl ToSql for NativeValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(self.to_sql_value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion() {
        let doc = json!({"a": 1, "b": [true, "x", 1.5], "c": null});
        let native = NativeValue::from_json(&doc);
        match &native {
            NativeValue::Object(pairs) => {
                assert_eq!(pairs[0], ("a".to_string(), NativeValue::Integer(1)));
                assert!(matches!(pairs[1].1, NativeValue::Array(_)));
            }
            other => panic!("expected object, got {:?}", other),
        }
        assert_eq!(native.to_json(), doc);
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(NativeValue::Integer(1).truthy(), Some(true));
        assert_eq!(NativeValue::Integer(0).truthy(), Some(false));
        assert_eq!(NativeValue::String("TRUE".into()).truthy(), Some(true));
        assert_eq!(NativeValue::String("maybe".into()).truthy(), None);
        assert_eq!(NativeValue::Null.truthy(), None);
    }

    #[test]
    fn test_sql_value_mapping() {
        assert_eq!(NativeValue::Bool(true).to_sql_value(), SqlValue::Integer(1));
        assert_eq!(
            NativeValue::Array(vec![NativeValue::Integer(1), NativeValue::Integer(2)]).to_sql_value(),
            SqlValue::Text("[1,2]".to_string())
        );
        assert_eq!(
            NativeValue::from(ValueRef::Text(b"abc")),
            NativeValue::String("abc".to_string())
        );
    }

    #[test]
    fn test_non_finite_float_is_null_json() {
        assert_eq!(NativeValue::Float(f64::INFINITY).to_json(), serde_json::Value::Null);
    }
}
