//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use crate::model::types::DimensionType;

use super::QuoteChars;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with `quote`, doubling any embedded quote character.
pub fn quote_with(ident: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    format!("{q}{}{q}", ident.replace(quote, &doubled), q = quote)
}

// =============================================================================
// String Quoting
// =============================================================================

/// Escape a string literal body.
///
/// When the escape character is the quote character, quotes are doubled.
/// Otherwise escape characters in the value are escaped first, then every
/// quote character is prefixed with the escape character.
pub fn escape_string(value: &str, quote: char, escape: char) -> String {
    if escape == quote {
        let doubled: String = [quote, quote].iter().collect();
        return value.replace(quote, &doubled);
    }

    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if c == escape || c == quote {
            out.push(escape);
        }
        out.push(c);
    }
    out
}

/// Quote a string literal using a dialect's quote characters.
pub fn quote_string(value: &str, chars: QuoteChars) -> String {
    format!(
        "{q}{}{q}",
        escape_string(value, chars.string, chars.escape),
        q = chars.string
    )
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: every supported warehouse
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Render a percentile in `0..=100` as a fraction literal.
pub fn percentile_fraction(percentile: f64) -> String {
    let mut buffer = ryu::Buffer::new();
    buffer.format(percentile / 100.0).to_string()
}

/// Render a percentile in `0..=100` as an integer offset.
pub fn percentile_offset(percentile: f64) -> i64 {
    percentile.round().clamp(0.0, 100.0) as i64
}

/// `PERCENTILE_CONT(p) WITHIN GROUP (ORDER BY sql)`.
/// Used by: Postgres, Redshift, Snowflake and the ANSI fallback
pub fn percentile_cont_within_group(sql: &str, percentile: f64) -> String {
    format!(
        "PERCENTILE_CONT({}) WITHIN GROUP (ORDER BY {})",
        percentile_fraction(percentile),
        sql
    )
}

// =============================================================================
// Native Types
// =============================================================================

/// Normalize a native type name before lookup.
///
/// Lowercases, strips parameters (`numeric(10,2)`, `varchar(255)`) and
/// element types (`array<int64>`, `struct<a int>`), and collapses whitespace.
pub fn normalize_native_type(native: &str) -> String {
    let lower = native.trim().to_lowercase();
    let base = match lower.find(['(', '<']) {
        Some(idx) => {
            let close = if lower.as_bytes()[idx] == b'(' { ')' } else { '>' };
            // Keep anything after the parameters, e.g. "timestamp(3) with time zone".
            let tail = lower[idx..]
                .rfind(close)
                .map(|end| &lower[idx + end + 1..])
                .unwrap_or("");
            format!("{} {}", &lower[..idx], tail)
        }
        None => lower,
    };
    base.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Look a native type up in a dialect's table. Unknown types are strings.
pub fn lookup_native_type(
    table: &[(&'static str, DimensionType)],
    native: &str,
) -> DimensionType {
    let key = normalize_native_type(native);
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, t)| *t)
        .unwrap_or(DimensionType::String)
}
