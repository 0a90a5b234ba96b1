//! Warehouse format strings.
//!
//! `FORMAT_TIMESTAMP` and `FORMAT_DATE` take warehouse format elements.
//! Each element is rendered through a fixed chrono specifier; unknown
//! elements are copied to the output literally.

use std::fmt::Write;

use chrono::{DateTime, NaiveDateTime, TimeZone};

/// One piece of a parsed format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Text copied verbatim
    Literal(String),
    /// A chrono specifier for a supported element
    Spec(&'static str),
    /// A zone element (`%Z` or `%z`)
    Zone(&'static str),
}

fn element(code: char) -> Option<Piece> {
    let spec = match code {
        'Y' => "%Y",
        'y' => "%y",
        'm' => "%m",
        'd' => "%d",
        'e' => "%e",
        'H' => "%H",
        'I' => "%I",
        'M' => "%M",
        'S' => "%S",
        'p' => "%p",
        'b' | 'h' => "%b",
        'B' => "%B",
        'a' => "%a",
        'A' => "%A",
        'j' => "%j",
        'u' => "%u",
        'w' => "%w",
        'F' => "%Y-%m-%d",
        'T' => "%H:%M:%S",
        'R' => "%H:%M",
        'D' => "%m/%d/%y",
        'Z' => return Some(Piece::Zone("%Z")),
        'z' => return Some(Piece::Zone("%z")),
        '%' => return Some(Piece::Literal("%".to_string())),
        _ => return None,
    };
    Some(Piece::Spec(spec))
}

/// Splits a warehouse format string into pieces.
pub fn parse(format: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        match chars.next() {
            Some(code) => match element(code) {
                Some(Piece::Literal(text)) => literal.push_str(&text),
                Some(piece) => {
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(piece);
                }
                None => {
                    literal.push('%');
                    literal.push(code);
                }
            },
            None => literal.push('%'),
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

/// Renders a zoned instant.
pub fn render_datetime<Tz>(format: &str, dt: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    for piece in parse(format) {
        match piece {
            Piece::Literal(text) => out.push_str(&text),
            Piece::Spec(spec) | Piece::Zone(spec) => {
                let _ = write!(out, "{}", dt.format(spec));
            }
        }
    }
    out
}

/// Renders a civil date-time. Zone elements render as UTC.
pub fn render_naive(format: &str, dt: &NaiveDateTime) -> String {
    let mut out = String::new();
    for piece in parse(format) {
        match piece {
            Piece::Literal(text) => out.push_str(&text),
            Piece::Spec(spec) => {
                let _ = write!(out, "{}", dt.format(spec));
            }
            Piece::Zone("%Z") => out.push_str("UTC"),
            Piece::Zone(_) => out.push_str("+0000"),
        }
    }
    out
}
