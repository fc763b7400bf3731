//! BigQuery dialect.
//!
//! BigQuery features:
//! - Backtick identifier quoting
//! - Backslash escapes inside string literals
//! - `APPROX_QUANTILES` instead of ordered-set aggregates
//! - Column types from a zero-row dry pass, table metadata from the API

use super::helpers;
use super::{CatalogSource, QuoteChars, ResultSchema, SqlDialect};
use crate::model::types::{DimensionType, WeekDay};

use DimensionType::{Boolean, Date, Number, Timestamp};

const NATIVE_TYPES: &[(&str, DimensionType)] = &[
    ("string", DimensionType::String),
    ("integer", Number),
    ("int64", Number),
    ("float", Number),
    ("float64", Number),
    ("numeric", Number),
    ("bignumeric", Number),
    ("bytes", Number),
    ("bool", Boolean),
    ("boolean", Boolean),
    ("date", Date),
    ("datetime", Timestamp),
    ("timestamp", Timestamp),
    ("time", Timestamp),
    ("geography", DimensionType::String),
    ("json", DimensionType::String),
    ("interval", DimensionType::String),
    ("record", DimensionType::String),
    ("struct", DimensionType::String),
    ("array", DimensionType::String),
];

/// BigQuery dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigQuery {
    start_of_week: Option<WeekDay>,
}

impl BigQuery {
    pub fn new(start_of_week: Option<WeekDay>) -> Self {
        Self { start_of_week }
    }
}

impl SqlDialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_chars(&self) -> QuoteChars {
        QuoteChars::new('`', '\'', '\\')
    }

    fn start_of_week(&self) -> Option<WeekDay> {
        self.start_of_week
    }

    fn percentile_sql(&self, sql: &str, percentile: f64) -> String {
        format!(
            "APPROX_QUANTILES({}, 100)[OFFSET({})]",
            sql,
            helpers::percentile_offset(percentile)
        )
    }

    fn native_types(&self) -> &'static [(&'static str, DimensionType)] {
        NATIVE_TYPES
    }

    fn result_schema(&self) -> ResultSchema {
        ResultSchema::DryRun
    }

    fn catalog_source(&self) -> CatalogSource {
        CatalogSource::NativeApi
    }
}
