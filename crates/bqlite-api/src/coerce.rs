//! Engine values to wire cells.
//!
//! Coercion never fails: a value that does not have the shape its field
//! expects is passed through as-is and the mismatch is logged.

use bqlite_core::temporal::{from_epoch_seconds, timestamp_micros};
use bqlite_core::{FieldSchema, Mode, NativeValue, TypeTag};
use serde_json::{json, Map, Value};
use tracing::warn;

/// Renders `value` as the wire value of a cell declared as `field`.
pub fn coerce_value(value: &NativeValue, field: &FieldSchema) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    if field.is_repeated() {
        return coerce_repeated(value, field);
    }
    if field.is_record() {
        return coerce_record(value, field);
    }
    coerce_scalar(value, field.field_type)
}

/// JSON documents arrive from the engine as text.
fn decode_document(value: &NativeValue) -> Option<NativeValue> {
    match value {
        NativeValue::String(text) => serde_json::from_str::<Value>(text)
            .ok()
            .map(|doc| NativeValue::from_json(&doc)),
        NativeValue::Array(_) | NativeValue::Object(_) => Some(value.clone()),
        _ => None,
    }
}

fn coerce_repeated(value: &NativeValue, field: &FieldSchema) -> Value {
    let element = field.clone().with_mode(Mode::Nullable);
    match decode_document(value) {
        Some(NativeValue::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| json!({ "v": coerce_value(item, &element) }))
                .collect(),
        ),
        _ => {
            warn!(field = %field.name, "REPEATED value is not a JSON array, passing through");
            value.to_json()
        }
    }
}

fn coerce_record(value: &NativeValue, field: &FieldSchema) -> Value {
    match decode_document(value) {
        Some(NativeValue::Object(pairs)) => {
            let mut object = Map::with_capacity(pairs.len());
            for (name, member) in &pairs {
                let coerced = match field.fields.iter().find(|f| &f.name == name) {
                    Some(nested) => coerce_value(member, nested),
                    None => member.to_json(),
                };
                object.insert(name.clone(), coerced);
            }
            Value::Object(object)
        }
        _ => {
            warn!(field = %field.name, "STRUCT value is not a JSON object, passing through");
            value.to_json()
        }
    }
}

fn coerce_scalar(value: &NativeValue, field_type: TypeTag) -> Value {
    let coerced = match field_type {
        TypeTag::Integer => integer_text(value),
        TypeTag::Bool => value
            .truthy()
            .map(|b| if b { "true" } else { "false" }.to_string()),
        TypeTag::Timestamp => timestamp_text(value),
        _ => None,
    };
    match coerced {
        Some(text) => Value::String(text),
        None => {
            if matches!(field_type, TypeTag::Integer | TypeTag::Bool | TypeTag::Timestamp) {
                warn!(field_type = %field_type, value = ?value, "value does not coerce, passing through");
            }
            value.to_json()
        }
    }
}

fn integer_text(value: &NativeValue) -> Option<String> {
    match value {
        NativeValue::Integer(i) => Some(i.to_string()),
        NativeValue::Float(f) if f.is_finite() && f.fract() == 0.0 => {
            Some(format!("{}", *f as i64))
        }
        NativeValue::Float(f) if f.is_finite() => Some(f.to_string()),
        NativeValue::Bool(b) => Some(i64::from(*b).to_string()),
        NativeValue::String(s) if s.trim().parse::<i64>().is_ok() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn timestamp_text(value: &NativeValue) -> Option<String> {
    let micros = match value {
        NativeValue::String(s) => timestamp_micros(s),
        NativeValue::Integer(seconds) => from_epoch_seconds(*seconds as f64)
            .and_then(|dt| dt.timestamp_millis().checked_mul(1000)),
        NativeValue::Float(seconds) => from_epoch_seconds(*seconds)
            .and_then(|dt| dt.timestamp_millis().checked_mul(1000)),
        _ => None,
    };
    micros.map(|m| m.to_string())
}
