//! Overflow-safe arithmetic: `SAFE_ADD`, `SAFE_SUBTRACT`, `SAFE_MULTIPLY`,
//! `SAFE_DIVIDE`, `SAFE_NEGATE`.
//!
//! Any NULL operand, integer overflow, division by zero or non-finite
//! float result yields NULL.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Value, ValueRef};
use rusqlite::Connection;
use tracing::debug;

/// A numeric operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Integral operand, checked arithmetic applies
    Int(i64),
    /// Float operand
    Float(f64),
}

impl Number {
    fn from_value(value: ValueRef<'_>) -> Option<Number> {
        match value {
            ValueRef::Integer(i) => Some(Number::Int(i)),
            ValueRef::Real(f) => Some(Number::Float(f)),
            ValueRef::Text(t) => {
                let text = std::str::from_utf8(t).ok()?.trim();
                text.parse::<i64>()
                    .map(Number::Int)
                    .or_else(|_| text.parse::<f64>().map(Number::Float))
                    .ok()
            }
            ValueRef::Null | ValueRef::Blob(_) => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Integer(i),
            Number::Float(f) if f.is_finite() => Value::Real(f),
            Number::Float(_) => Value::Null,
        }
    }
}

fn finite(f: f64) -> Option<Number> {
    f.is_finite().then_some(Number::Float(f))
}

fn binary(
    a: Number,
    b: Number,
    checked: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Option<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => checked(x, y).map(Number::Int),
        _ => finite(float(a.as_f64(), b.as_f64())),
    }
}

/// `SAFE_ADD(a, b)`.
pub fn safe_add(a: Number, b: Number) -> Option<Number> {
    binary(a, b, i64::checked_add, |x, y| x + y)
}

/// `SAFE_SUBTRACT(a, b)`.
pub fn safe_subtract(a: Number, b: Number) -> Option<Number> {
    binary(a, b, i64::checked_sub, |x, y| x - y)
}

/// `SAFE_MULTIPLY(a, b)`.
pub fn safe_multiply(a: Number, b: Number) -> Option<Number> {
    binary(a, b, i64::checked_mul, |x, y| x * y)
}

/// `SAFE_DIVIDE(a, b)`, always a float.
pub fn safe_divide(a: Number, b: Number) -> Option<Number> {
    let divisor = b.as_f64();
    if divisor == 0.0 {
        return None;
    }
    finite(a.as_f64() / divisor)
}

/// `SAFE_NEGATE(a)`.
pub fn safe_negate(a: Number) -> Option<Number> {
    match a {
        Number::Int(i) => i.checked_neg().map(Number::Int),
        Number::Float(f) => finite(-f),
    }
}

fn operand(ctx: &Context<'_>, idx: usize) -> Option<Number> {
    Number::from_value(ctx.get_raw(idx))
}

fn to_value(name: &str, result: Option<Number>) -> Value {
    match result {
        Some(n) => n.into_value(),
        None => {
            debug!(function = name, "safe arithmetic produced NULL");
            Value::Null
        }
    }
}

pub(crate) fn register(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    let binaries: [(&'static str, fn(Number, Number) -> Option<Number>); 4] = [
        ("SAFE_ADD", safe_add),
        ("SAFE_SUBTRACT", safe_subtract),
        ("SAFE_MULTIPLY", safe_multiply),
        ("SAFE_DIVIDE", safe_divide),
    ];
    for (name, op) in binaries {
        conn.create_scalar_function(name, 2, flags, move |ctx| {
            let result = match (operand(ctx, 0), operand(ctx, 1)) {
                (Some(a), Some(b)) => op(a, b),
                _ => None,
            };
            Ok(to_value(name, result))
        })?;
    }
    conn.create_scalar_function("SAFE_NEGATE", 1, flags, |ctx| {
        Ok(to_value("SAFE_NEGATE", operand(ctx, 0).and_then(safe_negate)))
    })?;
    Ok(())
}
