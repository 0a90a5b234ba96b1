//! Temporal parsing and normalization shared by the function library, the
//! parameter binder, streaming inserts and the coercion layer.
//!
//! Stored representations:
//!
//! | Type | Text form |
//! |---|---|
//! | TIMESTAMP | `YYYY-MM-DDTHH:MM:SS.sssZ` (UTC) |
//! | DATE | `YYYY-MM-DD` |
//! | DATETIME | `YYYY-MM-DDTHH:MM:SS[.fff]` |

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
];

/// Resolves an IANA zone name such as `Asia/Tokyo`.
pub fn resolve_zone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

fn canonical(text: &str) -> String {
    let mut s = text.trim().to_string();
    if let Some(stripped) = s.strip_suffix(" UTC") {
        s = format!("{}Z", stripped);
    }
    if s.len() > 10 && s.as_bytes()[10] == b' ' {
        s.replace_range(10..11, "T");
    }
    s.replace(" +", "+").replace(" -", "-")
}

/// Parses a civil date-time without zone information. Date-only input is
/// taken as midnight.
pub fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    let s = canonical(text);
    if let Some(date) = parse_plain_date(&s) {
        return date.and_hms_opt(0, 0, 0);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&s, fmt).ok())
}

fn parse_plain_date(s: &str) -> Option<NaiveDate> {
    if s.len() == 10 {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    } else {
        None
    }
}

/// Parses any accepted timestamp text into an instant. Text without an
/// offset is interpreted as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let s = canonical(text);
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = s.strip_suffix('Z').and_then(parse_naive_datetime) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }
    parse_naive_datetime(&s).map(|naive| Utc.from_utc_datetime(&naive))
}

/// Interprets zone-less text as local time in `zone` and returns the instant.
/// Text that carries its own offset keeps it.
pub fn parse_timestamp_in_zone(text: &str, zone: &Tz) -> Option<DateTime<Utc>> {
    let s = canonical(text);
    let has_offset = s.ends_with('Z')
        || s.get(19..)
            .is_some_and(|tail| tail.contains('+') || tail.contains('-'));
    if has_offset {
        return parse_timestamp(&s);
    }
    let naive = parse_naive_datetime(&s)?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Instant from epoch seconds.
pub fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let millis = (seconds * 1000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Microseconds since epoch, computed at millisecond precision.
pub fn timestamp_micros(text: &str) -> Option<i64> {
    parse_timestamp(text).and_then(|dt| dt.timestamp_millis().checked_mul(1000))
}

/// Renders an instant as the stored TIMESTAMP form.
pub fn format_timestamp_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Renders an instant as `YYYY-MM-DD HH:MM:SS+00:00`.
pub fn format_timestamp_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S+00:00").to_string()
}

/// Normalizes timestamp text to the stored TIMESTAMP form.
pub fn normalize_timestamp(text: &str) -> Option<String> {
    parse_timestamp(text).map(|dt| format_timestamp_iso(&dt))
}

/// Parses a date from `YYYY-MM-DD`, a date-time, or a timestamp with offset.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let s = canonical(text);
    if let Some(date) = parse_plain_date(&s) {
        return Some(date);
    }
    let has_zone = s.ends_with('Z') || s.get(19..).is_some_and(|t| t.contains('+') || t.contains('-'));
    if has_zone {
        return parse_timestamp(&s).map(|dt| dt.date_naive());
    }
    s.get(..10).and_then(parse_plain_date)
}

/// Normalizes date text to `YYYY-MM-DD`.
pub fn normalize_date(text: &str) -> Option<String> {
    parse_date(text).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Normalizes date-time text to `YYYY-MM-DDTHH:MM:SS`, keeping a trimmed
/// fractional part when present.
pub fn normalize_datetime(text: &str) -> Option<String> {
    let naive = parse_naive_datetime(text)?;
    let base = naive.format("%Y-%m-%dT%H:%M:%S").to_string();
    let fraction = naive.format("%.6f").to_string();
    let trimmed = fraction.trim_end_matches('0');
    if trimmed == "." || trimmed.is_empty() {
        Some(base)
    } else {
        Some(format!("{}{}", base, trimmed))
    }
}

/// Midnight of `date` as a naive date-time.
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}
