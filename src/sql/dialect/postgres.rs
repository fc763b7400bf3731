//! PostgreSQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Quote doubling inside string literals
//! - `PERCENTILE_CONT ... WITHIN GROUP` ordered-set aggregates
//! - Column types reported with the result set

use super::{QuoteChars, SqlDialect};
use crate::model::types::{DimensionType, WeekDay};

use DimensionType::{Boolean, Date, Number, Timestamp};

const NATIVE_TYPES: &[(&str, DimensionType)] = &[
    ("integer", Number),
    ("int", Number),
    ("int2", Number),
    ("int4", Number),
    ("int8", Number),
    ("money", Number),
    ("smallserial", Number),
    ("serial", Number),
    ("serial2", Number),
    ("serial4", Number),
    ("serial8", Number),
    ("bigserial", Number),
    ("bigint", Number),
    ("smallint", Number),
    ("double precision", Number),
    ("float", Number),
    ("float4", Number),
    ("float8", Number),
    ("numeric", Number),
    ("decimal", Number),
    ("real", Number),
    ("boolean", Boolean),
    ("bool", Boolean),
    ("date", Date),
    ("time", Timestamp),
    ("timetz", Timestamp),
    ("time without time zone", Timestamp),
    ("time with time zone", Timestamp),
    ("timestamp", Timestamp),
    ("timestamptz", Timestamp),
    ("timestamp without time zone", Timestamp),
    ("timestamp with time zone", Timestamp),
    ("json", DimensionType::String),
    ("jsonb", DimensionType::String),
    ("char", DimensionType::String),
    ("character", DimensionType::String),
    ("nchar", DimensionType::String),
    ("bpchar", DimensionType::String),
    ("varchar", DimensionType::String),
    ("character varying", DimensionType::String),
    ("nvarchar", DimensionType::String),
    ("text", DimensionType::String),
    ("uuid", DimensionType::String),
];

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres {
    start_of_week: Option<WeekDay>,
}

impl Postgres {
    pub fn new(start_of_week: Option<WeekDay>) -> Self {
        Self { start_of_week }
    }
}

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_chars(&self) -> QuoteChars {
        QuoteChars::new('"', '\'', '\'')
    }

    fn start_of_week(&self) -> Option<WeekDay> {
        self.start_of_week
    }

    fn native_types(&self) -> &'static [(&'static str, DimensionType)] {
        NATIVE_TYPES
    }
}
