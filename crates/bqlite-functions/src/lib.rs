//! # bqlite Functions
//!
//! Warehouse functions the embedded engine lacks, registered on a
//! `rusqlite::Connection`:
//!
//! - temporal: `TIMESTAMP`, `DATE`, `DATETIME`, `FORMAT_TIMESTAMP`,
//!   `FORMAT_DATE`, `TIMESTAMP_TRUNC`, `DATE_TRUNC`, `DATE_ADD`, `DATE_SUB`,
//!   `_CURRENT_DATE`
//! - safe arithmetic: `SAFE_ADD`, `SAFE_SUBTRACT`, `SAFE_MULTIPLY`,
//!   `SAFE_DIVIDE`, `SAFE_NEGATE`
//! - aggregates: `COUNTIF`
//!
//! Registration overrides the engine's built-in `date()` and `datetime()`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod format;
pub mod safe_math;
pub mod temporal;

use bqlite_core::{Error, Result};
use rusqlite::functions::Context;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

/// Registers every function on `conn`.
pub fn register_all(conn: &Connection) -> Result<()> {
    temporal::register(conn)
        .and_then(|_| safe_math::register(conn))
        .and_then(|_| aggregate::register(conn))
        .map_err(|e| Error::Engine(format!("function registration failed: {}", e)))?;
    debug!("registered warehouse functions");
    Ok(())
}

/// Argument `idx` as text; numbers are rendered, NULL is `None`.
pub(crate) fn text_arg(ctx: &Context<'_>, idx: usize) -> Option<String> {
    match ctx.get_raw(idx) {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

/// Argument `idx` as an integer; integral floats and numeric text are
/// accepted.
pub(crate) fn int_arg(ctx: &Context<'_>, idx: usize) -> Option<i64> {
    match ctx.get_raw(idx) {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
        ValueRef::Text(t) => std::str::from_utf8(t).ok()?.trim().parse().ok(),
        _ => None,
    }
}
