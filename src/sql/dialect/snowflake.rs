//! Snowflake dialect.
//!
//! Snowflake features:
//! - ANSI identifier quoting (`"`)
//! - Backslash escapes inside string literals
//! - `TIMESTAMP_LTZ`/`NTZ`/`TZ` variants
//! - Semi-structured types (VARIANT, OBJECT, ARRAY) surface as strings

use super::{QuoteChars, SqlDialect};
use crate::model::types::{DimensionType, WeekDay};

use DimensionType::{Boolean, Date, Number, Timestamp};

const NATIVE_TYPES: &[(&str, DimensionType)] = &[
    ("number", Number),
    ("decimal", Number),
    ("numeric", Number),
    ("int", Number),
    ("integer", Number),
    ("bigint", Number),
    ("smallint", Number),
    ("tinyint", Number),
    ("byteint", Number),
    ("float", Number),
    ("float4", Number),
    ("float8", Number),
    ("double", Number),
    ("double precision", Number),
    ("real", Number),
    ("fixed", Number),
    ("boolean", Boolean),
    ("date", Date),
    ("datetime", Timestamp),
    ("time", Timestamp),
    ("timestamp", Timestamp),
    ("timestamp_ltz", Timestamp),
    ("timestamp_ntz", Timestamp),
    ("timestamp_tz", Timestamp),
    ("varchar", DimensionType::String),
    ("char", DimensionType::String),
    ("character", DimensionType::String),
    ("string", DimensionType::String),
    ("text", DimensionType::String),
    ("binary", DimensionType::String),
    ("varbinary", DimensionType::String),
    ("variant", DimensionType::String),
    ("object", DimensionType::String),
    ("array", DimensionType::String),
    ("geography", DimensionType::String),
];

/// Snowflake dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Snowflake {
    start_of_week: Option<WeekDay>,
}

impl Snowflake {
    pub fn new(start_of_week: Option<WeekDay>) -> Self {
        Self { start_of_week }
    }
}

impl SqlDialect for Snowflake {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn quote_chars(&self) -> QuoteChars {
        QuoteChars::new('"', '\'', '\\')
    }

    fn start_of_week(&self) -> Option<WeekDay> {
        self.start_of_week
    }

    fn native_types(&self) -> &'static [(&'static str, DimensionType)] {
        NATIVE_TYPES
    }
}
