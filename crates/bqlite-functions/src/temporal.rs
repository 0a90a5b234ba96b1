//! Temporal constructors, formatters, truncation and interval arithmetic.

use bqlite_core::temporal::{
    format_timestamp_utc, normalize_datetime, parse_date, parse_timestamp,
    parse_timestamp_in_zone, resolve_zone, start_of_day,
};
use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, Timelike, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use tracing::warn;

use crate::format::{render_datetime, render_naive};
use crate::{int_arg, text_arg};

const TRUNCATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// `TIMESTAMP(text [, zone])`: the instant rendered as
/// `YYYY-MM-DD HH:MM:SS+00:00`. With a zone, zone-less text is local time
/// in that zone.
pub fn timestamp(text: &str, zone: Option<&str>) -> Option<String> {
    let instant = match zone {
        Some(name) => {
            let Some(tz) = resolve_zone(name) else {
                warn!(zone = %name, "unknown time zone in TIMESTAMP");
                return None;
            };
            parse_timestamp_in_zone(text, &tz)?
        }
        None => parse_timestamp(text)?,
    };
    Some(format_timestamp_utc(&instant))
}

/// `DATE(text)`: plain dates pass through, date-times keep their date part,
/// timestamps with an offset are converted to UTC first. `'now'` is today's
/// UTC date, as the engine's own `date('now')` would give.
pub fn date_from_text(text: &str) -> Option<String> {
    if text.trim().eq_ignore_ascii_case("now") {
        return Some(Utc::now().format(DATE_FORMAT).to_string());
    }
    parse_date(text).map(|d| d.format(DATE_FORMAT).to_string())
}

/// `DATE(year, month, day)`; an invalid calendar date yields `None`.
pub fn date_from_parts(year: i64, month: i64, day: i64) -> Option<String> {
    let date = NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )?;
    Some(date.format(DATE_FORMAT).to_string())
}

/// `DATETIME(text)`; `'now'` is the current UTC date-time.
pub fn datetime(text: &str) -> Option<String> {
    if text.trim().eq_ignore_ascii_case("now") {
        return normalize_datetime(&Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string());
    }
    normalize_datetime(text)
}

/// `FORMAT_TIMESTAMP(format, ts [, zone])`.
pub fn format_timestamp(format: &str, ts: &str, zone: Option<&str>) -> Option<String> {
    let instant = parse_timestamp(ts)?;
    match zone {
        Some(name) => {
            let Some(tz) = resolve_zone(name) else {
                warn!(zone = %name, "unknown time zone in FORMAT_TIMESTAMP");
                return None;
            };
            Some(render_datetime(format, &instant.with_timezone(&tz)))
        }
        None => Some(render_datetime(format, &instant)),
    }
}

/// `FORMAT_DATE(format, date)`.
pub fn format_date(format: &str, date: &str) -> Option<String> {
    let date = parse_date(date)?;
    Some(render_naive(format, &start_of_day(date)))
}

fn normalize_part(part: &str) -> String {
    part.trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .to_ascii_uppercase()
}

fn truncate_date(date: NaiveDate, part: &str) -> Option<NaiveDate> {
    match part {
        "DAY" => Some(date),
        "WEEK" => date.checked_sub_days(Days::new(u64::from(
            date.weekday().num_days_from_sunday(),
        ))),
        "MONTH" => date.with_day(1),
        "QUARTER" => NaiveDate::from_ymd_opt(date.year(), (date.month0() / 3) * 3 + 1, 1),
        "YEAR" => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        _ => None,
    }
}

fn truncate_datetime(dt: NaiveDateTime, part: &str) -> Option<NaiveDateTime> {
    match part {
        "SECOND" => dt.with_nanosecond(0),
        "MINUTE" => dt.with_nanosecond(0)?.with_second(0),
        "HOUR" => dt.with_nanosecond(0)?.with_second(0)?.with_minute(0),
        _ => truncate_date(dt.date(), part).map(start_of_day),
    }
}

/// `TIMESTAMP_TRUNC(ts, part)` rendered as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn timestamp_trunc(ts: &str, part: &str) -> Option<String> {
    let part = normalize_part(part);
    let instant = parse_timestamp(ts)?;
    match truncate_datetime(instant.naive_utc(), &part) {
        Some(truncated) => Some(truncated.format(TRUNCATED_FORMAT).to_string()),
        None => {
            warn!(part = %part, "unsupported TIMESTAMP_TRUNC part");
            None
        }
    }
}

/// `DATE_TRUNC(date, part)`.
pub fn date_trunc(date: &str, part: &str) -> Option<String> {
    let part = normalize_part(part);
    let date = parse_date(date)?;
    match truncate_date(date, &part) {
        Some(truncated) => Some(truncated.format(DATE_FORMAT).to_string()),
        None => {
            warn!(part = %part, "unsupported DATE_TRUNC part");
            None
        }
    }
}

fn strip_date_literal(text: &str) -> &str {
    let trimmed = text.trim();
    let without_keyword = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("DATE ") => &trimmed[5..],
        _ => trimmed,
    };
    without_keyword
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
}

fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let amount = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(amount)
    } else {
        date.checked_sub_months(amount)
    }
}

fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let amount = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(amount)
    } else {
        date.checked_sub_days(amount)
    }
}

/// `DATE_ADD(date, n, part)`. Month arithmetic clamps to the month end.
pub fn date_add(date: &str, amount: i64, part: &str) -> Option<String> {
    let date = parse_date(strip_date_literal(date))?;
    let part = normalize_part(part);
    let shifted = match part.as_str() {
        "DAY" => shift_days(date, amount),
        "WEEK" => shift_days(date, amount.checked_mul(7)?),
        "MONTH" => shift_months(date, amount),
        "QUARTER" => shift_months(date, amount.checked_mul(3)?),
        "YEAR" => shift_months(date, amount.checked_mul(12)?),
        _ => {
            warn!(part = %part, "unsupported DATE_ADD part");
            return None;
        }
    };
    shifted.map(|d| d.format(DATE_FORMAT).to_string())
}

/// `DATE_SUB(date, n, part)`.
pub fn date_sub(date: &str, amount: i64, part: &str) -> Option<String> {
    date_add(date, amount.checked_neg()?, part)
}

/// Today's date in `zone`.
pub fn current_date(zone: &str) -> Option<String> {
    let Some(tz) = resolve_zone(zone) else {
        warn!(zone = %zone, "unknown time zone in CURRENT_DATE");
        return None;
    };
    Some(Utc::now().with_timezone(&tz).format(DATE_FORMAT).to_string())
}

pub(crate) fn register(conn: &Connection) -> rusqlite::Result<()> {
    let pure = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("TIMESTAMP", 1, pure, |ctx| {
        Ok(text_arg(ctx, 0).and_then(|t| timestamp(&t, None)))
    })?;
    conn.create_scalar_function("TIMESTAMP", 2, pure, |ctx| {
        Ok(match (text_arg(ctx, 0), text_arg(ctx, 1)) {
            (Some(t), Some(zone)) => timestamp(&t, Some(&zone)),
            _ => None,
        })
    })?;
    conn.create_scalar_function("DATE", 1, FunctionFlags::SQLITE_UTF8, |ctx| {
        Ok(text_arg(ctx, 0).and_then(|t| date_from_text(&t)))
    })?;
    conn.create_scalar_function("DATE", 3, pure, |ctx| {
        Ok(match (int_arg(ctx, 0), int_arg(ctx, 1), int_arg(ctx, 2)) {
            (Some(y), Some(m), Some(d)) => date_from_parts(y, m, d),
            _ => None,
        })
    })?;
    conn.create_scalar_function("DATETIME", 1, FunctionFlags::SQLITE_UTF8, |ctx| {
        Ok(text_arg(ctx, 0).and_then(|t| datetime(&t)))
    })?;
    conn.create_scalar_function("FORMAT_TIMESTAMP", 2, pure, |ctx| {
        Ok(match (text_arg(ctx, 0), text_arg(ctx, 1)) {
            (Some(fmt), Some(ts)) => format_timestamp(&fmt, &ts, None),
            _ => None,
        })
    })?;
    conn.create_scalar_function("FORMAT_TIMESTAMP", 3, pure, |ctx| {
        Ok(match (text_arg(ctx, 0), text_arg(ctx, 1), text_arg(ctx, 2)) {
            (Some(fmt), Some(ts), Some(zone)) => format_timestamp(&fmt, &ts, Some(&zone)),
            _ => None,
        })
    })?;
    conn.create_scalar_function("FORMAT_DATE", 2, pure, |ctx| {
        Ok(match (text_arg(ctx, 0), text_arg(ctx, 1)) {
            (Some(fmt), Some(date)) => format_date(&fmt, &date),
            _ => None,
        })
    })?;
    conn.create_scalar_function("TIMESTAMP_TRUNC", 2, pure, |ctx| {
        Ok(match (text_arg(ctx, 0), text_arg(ctx, 1)) {
            (Some(ts), Some(part)) => timestamp_trunc(&ts, &part),
            _ => None,
        })
    })?;
    conn.create_scalar_function("DATE_TRUNC", 2, pure, |ctx| {
        Ok(match (text_arg(ctx, 0), text_arg(ctx, 1)) {
            (Some(date), Some(part)) => date_trunc(&date, &part),
            _ => None,
        })
    })?;
    conn.create_scalar_function("DATE_ADD", 3, pure, |ctx| {
        Ok(match (text_arg(ctx, 0), int_arg(ctx, 1), text_arg(ctx, 2)) {
            (Some(date), Some(n), Some(part)) => date_add(&date, n, &part),
            _ => None,
        })
    })?;
    conn.create_scalar_function("DATE_SUB", 3, pure, |ctx| {
        Ok(match (text_arg(ctx, 0), int_arg(ctx, 1), text_arg(ctx, 2)) {
            (Some(date), Some(n), Some(part)) => date_sub(&date, n, &part),
            _ => None,
        })
    })?;
    conn.create_scalar_function("_CURRENT_DATE", 1, FunctionFlags::SQLITE_UTF8, |ctx| {
        Ok(text_arg(ctx, 0).and_then(|zone| current_date(&zone)))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_in_zone() {
        assert_eq!(
            timestamp("2023-12-25 10:30:45", Some("Asia/Tokyo")).as_deref(),
            Some("2023-12-25 01:30:45+00:00")
        );
        assert_eq!(
            timestamp("2023-12-25", None).as_deref(),
            Some("2023-12-25 00:00:00+00:00")
        );
        assert!(timestamp("2023-12-25", Some("Nowhere/Land")).is_none());
    }

    #[test]
    fn test_date_constructors() {
        assert_eq!(date_from_parts(2024, 2, 29).as_deref(), Some("2024-02-29"));
        assert!(date_from_parts(2024, 2, 30).is_none());
        assert!(date_from_parts(2024, -1, 1).is_none());
        assert_eq!(date_from_text("2024-01-15").as_deref(), Some("2024-01-15"));
        assert_eq!(date_from_text("2024-01-15 23:59:59").as_deref(), Some("2024-01-15"));
        assert_eq!(date_from_text("2024-01-15T23:00:00-05:00").as_deref(), Some("2024-01-16"));
        assert!(date_from_text("yesterday").is_none());
    }

    #[test]
    fn test_date_now_is_today_in_utc() {
        let before = Utc::now().date_naive();
        let today = date_from_text("now").unwrap();
        let after = Utc::now().date_naive();
        let parsed = NaiveDate::parse_from_str(&today, DATE_FORMAT).unwrap();
        assert!(parsed == before || parsed == after);
        assert_eq!(date_from_text(" NOW ").map(|d| d.len()), Some(10));
    }

    #[test]
    fn test_timestamp_trunc_parts() {
        let ts = "2023-12-25 10:30:45";
        assert_eq!(timestamp_trunc(ts, "DAY").as_deref(), Some("2023-12-25 00:00:00"));
        assert_eq!(timestamp_trunc(ts, "YEAR").as_deref(), Some("2023-01-01 00:00:00"));
        assert_eq!(timestamp_trunc(ts, "MONTH").as_deref(), Some("2023-12-01 00:00:00"));
        assert_eq!(timestamp_trunc(ts, "hour").as_deref(), Some("2023-12-25 10:00:00"));
        assert_eq!(timestamp_trunc(ts, "MINUTE").as_deref(), Some("2023-12-25 10:30:00"));
        assert_eq!(timestamp_trunc(ts, "WEEK").as_deref(), Some("2023-12-24 00:00:00"));
        assert!(timestamp_trunc(ts, "FORTNIGHT").is_none());
    }

    #[test]
    fn test_date_trunc() {
        assert_eq!(date_trunc("2024-05-17", "MONTH").as_deref(), Some("2024-05-01"));
        assert_eq!(date_trunc("2024-05-17", "QUARTER").as_deref(), Some("2024-04-01"));
        assert_eq!(date_trunc("2024-05-17", "'YEAR'").as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_date_add_and_sub() {
        assert_eq!(date_add("2024-01-15", 10, "DAY").as_deref(), Some("2024-01-25"));
        assert_eq!(date_add("DATE '2024-01-15'", 10, "DAY").as_deref(), Some("2024-01-25"));
        assert_eq!(date_add("2024-01-31", 1, "MONTH").as_deref(), Some("2024-02-29"));
        assert_eq!(date_add("2024-02-29", 1, "YEAR").as_deref(), Some("2025-02-28"));
        assert_eq!(date_sub("2024-03-01", 1, "DAY").as_deref(), Some("2024-02-29"));
        assert_eq!(date_add("2024-01-01", 2, "WEEK").as_deref(), Some("2024-01-15"));
        assert!(date_add("2024-01-01", 1, "FORTNIGHT").is_none());
    }

    #[test]
    fn test_format_functions() {
        assert_eq!(
            format_timestamp("%Y-%m-%d %H:%M", "2023-12-25 10:30:00", Some("Asia/Tokyo")).as_deref(),
            Some("2023-12-25 19:30")
        );
        assert_eq!(
            format_timestamp("%F", "2023-12-25T23:30:00Z", None).as_deref(),
            Some("2023-12-25")
        );
        assert_eq!(format_date("%d/%m/%Y", "2024-01-15").as_deref(), Some("15/01/2024"));
    }

    #[test]
    fn test_current_date_in_zone() {
        let today = current_date("UTC").unwrap();
        assert_eq!(today.len(), 10);
        assert!(current_date("Not/AZone").is_none());
    }
}
