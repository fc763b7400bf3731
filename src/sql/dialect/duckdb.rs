//! DuckDB dialect.
//!
//! DuckDB features:
//! - ANSI identifier quoting (`"`)
//! - `QUANTILE_CONT(x, p)` for percentiles
//! - Unsigned and huge integer types

use super::helpers;
use super::{QuoteChars, SqlDialect};
use crate::model::types::{DimensionType, WeekDay};

use DimensionType::{Boolean, Date, Number, Timestamp};

const NATIVE_TYPES: &[(&str, DimensionType)] = &[
    ("bigint", Number),
    ("int8", Number),
    ("long", Number),
    ("integer", Number),
    ("int4", Number),
    ("int", Number),
    ("signed", Number),
    ("smallint", Number),
    ("int2", Number),
    ("short", Number),
    ("tinyint", Number),
    ("int1", Number),
    ("hugeint", Number),
    ("uhugeint", Number),
    ("ubigint", Number),
    ("uinteger", Number),
    ("usmallint", Number),
    ("utinyint", Number),
    ("double", Number),
    ("float8", Number),
    ("real", Number),
    ("float4", Number),
    ("float", Number),
    ("decimal", Number),
    ("numeric", Number),
    ("boolean", Boolean),
    ("bool", Boolean),
    ("logical", Boolean),
    ("date", Date),
    ("timestamp", Timestamp),
    ("datetime", Timestamp),
    ("timestamptz", Timestamp),
    ("timestamp with time zone", Timestamp),
    ("timestamp_s", Timestamp),
    ("timestamp_ms", Timestamp),
    ("timestamp_ns", Timestamp),
    ("time", Timestamp),
    ("timetz", Timestamp),
    ("time with time zone", Timestamp),
    ("varchar", DimensionType::String),
    ("char", DimensionType::String),
    ("bpchar", DimensionType::String),
    ("text", DimensionType::String),
    ("string", DimensionType::String),
    ("blob", DimensionType::String),
    ("uuid", DimensionType::String),
    ("interval", DimensionType::String),
    ("json", DimensionType::String),
];

/// DuckDB dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDb {
    start_of_week: Option<WeekDay>,
}

impl DuckDb {
    pub fn new(start_of_week: Option<WeekDay>) -> Self {
        Self { start_of_week }
    }
}

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_chars(&self) -> QuoteChars {
        QuoteChars::new('"', '\'', '\'')
    }

    fn start_of_week(&self) -> Option<WeekDay> {
        self.start_of_week
    }

    fn percentile_sql(&self, sql: &str, percentile: f64) -> String {
        format!(
            "QUANTILE_CONT({}, {})",
            sql,
            helpers::percentile_fraction(percentile)
        )
    }

    fn native_types(&self) -> &'static [(&'static str, DimensionType)] {
        NATIVE_TYPES
    }
}
