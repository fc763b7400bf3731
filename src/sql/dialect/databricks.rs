//! Databricks (Spark SQL) dialect.
//!
//! Databricks features:
//! - Backtick identifier quoting
//! - Backslash escapes inside string literals
//! - `PERCENTILE(x, p)` exact percentiles
//! - Table metadata from Unity Catalog rather than information_schema

use super::helpers;
use super::{CatalogSource, QuoteChars, SqlDialect};
use crate::model::types::{DimensionType, WeekDay};

use DimensionType::{Boolean, Date, Number, Timestamp};

const NATIVE_TYPES: &[(&str, DimensionType)] = &[
    ("tinyint", Number),
    ("byte", Number),
    ("smallint", Number),
    ("short", Number),
    ("int", Number),
    ("integer", Number),
    ("bigint", Number),
    ("long", Number),
    ("float", Number),
    ("real", Number),
    ("double", Number),
    ("decimal", Number),
    ("dec", Number),
    ("numeric", Number),
    ("boolean", Boolean),
    ("date", Date),
    ("timestamp", Timestamp),
    ("timestamp_ntz", Timestamp),
    ("timestamp_ltz", Timestamp),
    ("string", DimensionType::String),
    ("varchar", DimensionType::String),
    ("char", DimensionType::String),
    ("binary", DimensionType::String),
    ("array", DimensionType::String),
    ("map", DimensionType::String),
    ("struct", DimensionType::String),
    ("interval", DimensionType::String),
    ("void", DimensionType::String),
];

/// Databricks dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Databricks {
    start_of_week: Option<WeekDay>,
}

impl Databricks {
    pub fn new(start_of_week: Option<WeekDay>) -> Self {
        Self { start_of_week }
    }
}

impl SqlDialect for Databricks {
    fn name(&self) -> &'static str {
        "databricks"
    }

    fn quote_chars(&self) -> QuoteChars {
        QuoteChars::new('`', '\'', '\\')
    }

    fn start_of_week(&self) -> Option<WeekDay> {
        self.start_of_week
    }

    fn percentile_sql(&self, sql: &str, percentile: f64) -> String {
        format!(
            "PERCENTILE({}, {})",
            sql,
            helpers::percentile_fraction(percentile)
        )
    }

    fn native_types(&self) -> &'static [(&'static str, DimensionType)] {
        NATIVE_TYPES
    }

    fn catalog_source(&self) -> CatalogSource {
        CatalogSource::NativeApi
    }
}
