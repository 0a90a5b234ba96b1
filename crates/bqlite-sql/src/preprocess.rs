//! Text-level rewriting applied before parsing.
//!
//! These rewrites handle shapes the parser would either reject or represent
//! in a way the embedded engine cannot execute:
//!
//! - `IN UNNEST(expr)` becomes an `IN (SELECT value FROM json_each(expr))`
//!   subquery
//! - `UNNEST(expr) AS a [WITH OFFSET [AS o]]` in a FROM list becomes the
//!   table-valued `json_each(expr) AS a (o)`; the alias column carries the
//!   offset name until the transformer binds it
//! - `DELETE [FROM] d.t` always gets exactly one FROM and a quoted table
//! - dotted table names after FROM/JOIN/INSERT INTO/UPDATE/CREATE TABLE/
//!   DROP TABLE become one backtick-quoted `dataset.table` identifier
//!
//! Parameter placeholders are left alone apart from `@`name`` which loses
//! its backticks.

use std::sync::OnceLock;

use regex::{Captures, Regex};

fn parameter_backticks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@`([^`]*)`").expect("valid parameter regex"))
}

fn delete_target() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bDELETE\s+(?:FROM\s+)?`?([A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+){1,2})`?")
            .expect("valid delete regex")
    })
}

fn table_target() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(FROM|JOIN|INSERT\s+INTO|UPDATE|CREATE\s+TABLE(?:\s+IF\s+NOT\s+EXISTS)?|DROP\s+TABLE(?:\s+IF\s+EXISTS)?)\s+(`[^`]+`(?:\.`[^`]+`)*|[A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z_][A-Za-z0-9_-]*){1,2})",
        )
        .expect("valid table regex")
    })
}

fn quoted_table() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"`([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)`").expect("valid quoted table regex")
    })
}

/// Words that end a FROM item and therefore can never be an alias.
const CLAUSE_WORDS: &[&str] = &[
    "AS", "CROSS", "EXCEPT", "FULL", "GROUP", "HAVING", "INNER", "INTERSECT", "JOIN", "LEFT",
    "LIMIT", "ON", "ORDER", "OUTER", "QUALIFY", "RIGHT", "UNION", "USING", "WHERE", "WINDOW",
    "WITH",
];

/// Runs every rewrite in order.
pub fn preprocess(sql: &str) -> String {
    let sql = parameter_backticks().replace_all(sql, "@$1");
    let sql = rewrite_unnest(&sql);
    let sql = normalize_delete(&sql);
    quote_table_names(&sql)
}

/// First backtick-quoted `dataset.table` reference in preprocessed text.
pub fn table_reference(sql: &str) -> Option<(String, String)> {
    quoted_table()
        .captures(sql)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn keyword_at(bytes: &[u8], at: usize, keyword: &str) -> bool {
    let end = at + keyword.len();
    end <= bytes.len()
        && bytes[at..end].eq_ignore_ascii_case(keyword.as_bytes())
        && (at == 0 || !is_word_byte(bytes[at - 1]))
        && (end == bytes.len() || !is_word_byte(bytes[end]))
}

fn skip_ws(bytes: &[u8], mut at: usize) -> usize {
    while at < bytes.len() && bytes[at].is_ascii_whitespace() {
        at += 1;
    }
    at
}

/// Index just past the quoted run that starts at `start`.
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\\' && quote != b'`' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Index of the `)` matching the `(` at `open`.
fn matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Reads an identifier at `at`: a backtick-quoted name or a bare word.
fn identifier_at(sql: &str, at: usize) -> Option<(String, usize)> {
    let bytes = sql.as_bytes();
    if at >= bytes.len() {
        return None;
    }
    if bytes[at] == b'`' {
        let end = skip_quoted(bytes, at);
        if end <= at + 2 || bytes[end - 1] != b'`' {
            return None;
        }
        return Some((sql[at + 1..end - 1].to_string(), end));
    }
    if !(bytes[at].is_ascii_alphabetic() || bytes[at] == b'_') {
        return None;
    }
    let mut end = at;
    while end < bytes.len() && is_word_byte(bytes[end]) {
        end += 1;
    }
    Some((sql[at..end].to_string(), end))
}

fn alias_at(sql: &str, at: usize) -> Option<(String, usize)> {
    let bytes = sql.as_bytes();
    if keyword_at(bytes, at, "AS") {
        return identifier_at(sql, skip_ws(bytes, at + 2));
    }
    identifier_at(sql, at).filter(|(name, _)| {
        !CLAUSE_WORDS
            .iter()
            .any(|word| word.eq_ignore_ascii_case(name))
    })
}

struct UnnestAlias {
    alias: Option<String>,
    offset: Option<String>,
    end: usize,
}

/// Parses `[AS] alias [WITH OFFSET [[AS] offset]]` after an UNNEST call.
fn unnest_alias(sql: &str, after_call: usize) -> UnnestAlias {
    let bytes = sql.as_bytes();
    let mut parsed = UnnestAlias {
        alias: None,
        offset: None,
        end: after_call,
    };
    if let Some((alias, end)) = alias_at(sql, skip_ws(bytes, after_call)) {
        parsed.alias = Some(alias);
        parsed.end = end;
    }
    let with = skip_ws(bytes, parsed.end);
    if keyword_at(bytes, with, "WITH") {
        let offset = skip_ws(bytes, with + 4);
        if keyword_at(bytes, offset, "OFFSET") {
            parsed.end = offset + 6;
            parsed.offset = Some("offset".to_string());
            if let Some((name, end)) = alias_at(sql, skip_ws(bytes, parsed.end)) {
                parsed.offset = Some(name);
                parsed.end = end;
            }
        }
    }
    parsed
}

fn preceded_by_in(prefix: &str) -> bool {
    let trimmed = prefix.trim_end().as_bytes();
    trimmed.len() >= 2 && keyword_at(trimmed, trimmed.len() - 2, "IN")
}

/// Rewrites every `UNNEST(...)` outside string literals.
pub fn rewrite_unnest(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + 32);
    let mut generated = 0usize;
    let mut copied = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            _ if keyword_at(bytes, i, "UNNEST") => {
                let open = skip_ws(bytes, i + 6);
                let close = (open < bytes.len() && bytes[open] == b'(')
                    .then(|| matching_paren(bytes, open))
                    .flatten();
                let Some(close) = close else {
                    i += 6;
                    continue;
                };
                let inner = rewrite_unnest(&sql[open + 1..close]);
                out.push_str(&sql[copied..i]);
                if preceded_by_in(&sql[..i]) {
                    out.push_str(&format!("(SELECT value FROM json_each({}))", inner));
                    i = close + 1;
                } else {
                    let parsed = unnest_alias(sql, close + 1);
                    let alias = parsed.alias.unwrap_or_else(|| {
                        let name = format!("f{}_", generated);
                        generated += 1;
                        name
                    });
                    out.push_str(&format!("json_each({}) AS {}", inner, alias));
                    if let Some(offset) = parsed.offset {
                        out.push_str(&format!(" ({})", offset));
                    }
                    i = parsed.end;
                }
                copied = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&sql[copied..]);
    out
}

/// `DELETE [FROM] [p.]d.t` becomes ``DELETE FROM `d.t` ``.
pub fn normalize_delete(sql: &str) -> String {
    delete_target()
        .replace_all(sql, |caps: &Captures<'_>| {
            let parts: Vec<&str> = caps[1].split('.').collect();
            let start = parts.len().saturating_sub(2);
            format!("DELETE FROM `{}`", parts[start..].join("."))
        })
        .into_owned()
}

/// Quotes dotted table names as a single `dataset.table` identifier.
pub fn quote_table_names(sql: &str) -> String {
    table_target()
        .replace_all(sql, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let end = caps.get(0).map_or(0, |m| m.end());
            if sql[end..].trim_start().starts_with(')') {
                return whole.to_string();
            }
            let parts: Vec<&str> = caps[2]
                .split('.')
                .map(|part| part.trim_matches('`'))
                .collect();
            if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
                return whole.to_string();
            }
            let start = parts.len().saturating_sub(2);
            format!("{} `{}`", &caps[1], parts[start..].join("."))
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unnest_in_from() {
        assert_eq!(
            rewrite_unnest("SELECT * FROM UNNEST([1, 2, 3]) AS num"),
            "SELECT * FROM json_each([1, 2, 3]) AS num"
        );
        assert_eq!(
            rewrite_unnest("SELECT x FROM UNNEST(['a)', 'b']) x WHERE x > 'a'"),
            "SELECT x FROM json_each(['a)', 'b']) AS x WHERE x > 'a'"
        );
    }

    #[test]
    fn test_unnest_with_offset() {
        assert_eq!(
            rewrite_unnest("SELECT num, offset FROM UNNEST([10, 20]) AS num WITH OFFSET"),
            "SELECT num, offset FROM json_each([10, 20]) AS num (offset)"
        );
        assert_eq!(
            rewrite_unnest("SELECT v, pos FROM UNNEST(@items) v WITH OFFSET AS pos ORDER BY pos"),
            "SELECT v, pos FROM json_each(@items) AS v (pos) ORDER BY pos"
        );
    }

    #[test]
    fn test_unnest_without_alias() {
        assert_eq!(
            rewrite_unnest("SELECT * FROM UNNEST([1]) WHERE true"),
            "SELECT * FROM json_each([1]) AS f0_ WHERE true"
        );
    }

    #[test]
    fn test_in_unnest() {
        assert_eq!(
            rewrite_unnest("SELECT id FROM t WHERE num IN UNNEST(@nums)"),
            "SELECT id FROM t WHERE num IN (SELECT value FROM json_each(@nums))"
        );
        assert_eq!(
            rewrite_unnest("SELECT id FROM t WHERE num NOT IN UNNEST([1, 2])"),
            "SELECT id FROM t WHERE num NOT IN (SELECT value FROM json_each([1, 2]))"
        );
    }

    #[test]
    fn test_unnest_inside_literal_untouched() {
        let sql = "SELECT 'UNNEST(x)' AS s";
        assert_eq!(rewrite_unnest(sql), sql);
    }

    #[test]
    fn test_delete_normalization() {
        assert_eq!(
            normalize_delete("DELETE d.t WHERE id = 1"),
            "DELETE FROM `d.t` WHERE id = 1"
        );
        assert_eq!(
            normalize_delete("delete from `p.d.t` where id = 1"),
            "DELETE FROM `d.t` where id = 1"
        );
    }

    #[test]
    fn test_quote_table_names() {
        assert_eq!(
            quote_table_names("SELECT * FROM d.t JOIN p.d.u ON t.id = u.id"),
            "SELECT * FROM `d.t` JOIN `d.u` ON t.id = u.id"
        );
        assert_eq!(
            quote_table_names("INSERT INTO `d`.`t` (id) VALUES (1)"),
            "INSERT INTO `d.t` (id) VALUES (1)"
        );
        assert_eq!(
            quote_table_names("CREATE TABLE IF NOT EXISTS d.t (id INT64)"),
            "CREATE TABLE IF NOT EXISTS `d.t` (id INT64)"
        );
        let extract = "SELECT EXTRACT(DAY FROM t.created)";
        assert_eq!(quote_table_names(extract), extract);
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let sql = "SELECT * FROM `d.t` WHERE id IN UNNEST(@ids)";
        let once = preprocess(sql);
        assert_eq!(preprocess(&once), once);
        assert_eq!(table_reference(&once), Some(("d".to_string(), "t".to_string())));
    }

    #[test]
    fn test_parameter_backticks() {
        assert_eq!(preprocess("SELECT @`limit`"), "SELECT @limit");
    }
}
