//! Amazon Redshift dialect.
//!
//! Redshift speaks the PostgreSQL wire protocol and shares its quoting, but
//! has its own type names (`super`, `geometry`) and no serial types.

use super::{QuoteChars, SqlDialect};
use crate::model::types::{DimensionType, WeekDay};

use DimensionType::{Boolean, Date, Number, Timestamp};

const NATIVE_TYPES: &[(&str, DimensionType)] = &[
    ("smallint", Number),
    ("int2", Number),
    ("integer", Number),
    ("int", Number),
    ("int4", Number),
    ("bigint", Number),
    ("int8", Number),
    ("decimal", Number),
    ("numeric", Number),
    ("real", Number),
    ("float4", Number),
    ("double precision", Number),
    ("float8", Number),
    ("float", Number),
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
    ("char", DimensionType::String),
    ("character", DimensionType::String),
    ("nchar", DimensionType::String),
    ("bpchar", DimensionType::String),
    ("varchar", DimensionType::String),
    ("character varying", DimensionType::String),
    ("nvarchar", DimensionType::String),
    ("text", DimensionType::String),
    ("super", DimensionType::String),
    ("geometry", DimensionType::String),
    ("varbyte", DimensionType::String),
];

/// Amazon Redshift dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redshift {
    start_of_week: Option<WeekDay>,
}

impl Redshift {
    pub fn new(start_of_week: Option<WeekDay>) -> Self {
        Self { start_of_week }
    }
}

impl SqlDialect for Redshift {
    fn name(&self) -> &'static str {
        "redshift"
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
