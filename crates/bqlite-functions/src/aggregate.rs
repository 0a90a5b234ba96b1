//! Aggregate functions.

use bqlite_core::NativeValue;
use rusqlite::functions::{Aggregate, Context, FunctionFlags};
use rusqlite::Connection;

/// `COUNTIF(predicate)`: number of rows where the predicate is true.
pub struct CountIf;

impl Aggregate<i64, i64> for CountIf {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<i64> {
        Ok(0)
    }

    fn step(&self, ctx: &mut Context<'_>, count: &mut i64) -> rusqlite::Result<()> {
        if NativeValue::from(ctx.get_raw(0)).truthy() == Some(true) {
            *count += 1;
        }
        Ok(())
    }

    fn finalize(&self, _ctx: &mut Context<'_>, count: Option<i64>) -> rusqlite::Result<i64> {
        Ok(count.unwrap_or(0))
    }
}

pub(crate) fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_aggregate_function(
        "COUNTIF",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        CountIf,
    )
}
