//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for warehouse differences.
//! Each dialect implements `SqlDialect` to describe its specific syntax and
//! capabilities:
//!
//! - Quote characters: field quote, string quote and string escape
//! - First day of the week used for week truncation
//! - Percentile and median aggregate forms
//! - Native column type names and their canonical mapping
//! - How result column types and catalog metadata are obtained
//!
//! # Usage
//!
//! ```ignore
//! use quarry::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres.build(None);
//! let quoted = dialect.quote_identifier("user");  // "user"
//! ```
//!
//! | Dialect | Field | String | Escape | Percentile | Catalog |
//! |---------|-------|--------|--------|------------|---------|
//! | postgres | `"` | `'` | `'` | PERCENTILE_CONT | information_schema |
//! | redshift | `"` | `'` | `'` | PERCENTILE_CONT | information_schema |
//! | snowflake | `"` | `'` | `\` | PERCENTILE_CONT | information_schema |
//! | duckdb | `"` | `'` | `'` | QUANTILE_CONT | information_schema |
//! | bigquery | `` ` `` | `'` | `\` | APPROX_QUANTILES | native API |
//! | databricks | `` ` `` | `'` | `\` | PERCENTILE | native API |

mod bigquery;
mod databricks;
mod duckdb;
pub mod helpers;
mod postgres;
mod redshift;
mod snowflake;

pub use bigquery::BigQuery;
pub use databricks::Databricks;
pub use duckdb::DuckDb;
pub use postgres::Postgres;
pub use redshift::Redshift;
pub use snowflake::Snowflake;

use serde::{Deserialize, Serialize};

use super::metric::default_metric_sql;
use super::token::{Token, TokenStream};
use crate::model::explore::Metric;
use crate::model::types::{DimensionType, MetricType, WeekDay};

/// Quote characters of a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteChars {
    /// Quotes identifiers.
    pub field: char,
    /// Quotes string literals.
    pub string: char,
    /// Escapes the string quote inside literals.
    pub escape: char,
}

impl QuoteChars {
    pub const fn new(field: char, string: char, escape: char) -> Self {
        Self {
            field,
            string,
            escape,
        }
    }
}

/// Where result column types come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSchema {
    /// The cursor reports column types when it opens.
    ResultMetadata,
    /// A zero-row pass of the same statement reports the schema first.
    DryRun,
}

/// How catalog metadata is fetched for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    /// One `information_schema.columns` query per table.
    InformationSchema,
    /// The warehouse's own table metadata call.
    NativeApi,
}

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug + Send + Sync {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Field quote, string quote and string escape characters.
    fn quote_chars(&self) -> QuoteChars;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_with(ident, self.quote_chars().field)
    }

    /// Quote and escape a string literal.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string(s, self.quote_chars())
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    // =========================================================================
    // Dates
    // =========================================================================

    /// Configured first day of the week, if any.
    fn start_of_week(&self) -> Option<WeekDay>;

    /// First day of the week used when truncating to weeks.
    fn effective_start_of_week(&self) -> WeekDay {
        self.start_of_week().unwrap_or(WeekDay::Monday)
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit the row limit clause.
    fn emit_limit(&self, limit: u64) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Limit)
            .space()
            .push(Token::LitInt(i64::try_from(limit).unwrap_or(i64::MAX)));
        ts
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Percentile aggregate of `sql`, percentile in `0..=100`.
    fn percentile_sql(&self, sql: &str, percentile: f64) -> String {
        helpers::percentile_cont_within_group(sql, percentile)
    }

    /// Aggregate expression of `metric` over `sql`.
    fn metric_sql(&self, sql: &str, metric: &Metric) -> String {
        match metric.metric_type {
            MetricType::Percentile => self.percentile_sql(sql, metric.percentile.unwrap_or(50.0)),
            MetricType::Median => self.percentile_sql(sql, 50.0),
            other => default_metric_sql(sql, other),
        }
    }

    // =========================================================================
    // Types and Metadata
    // =========================================================================

    /// Every native type name this dialect recognises, normalized.
    fn native_types(&self) -> &'static [(&'static str, DimensionType)];

    /// Map a native column type to its canonical type.
    ///
    /// Unknown types map to [`DimensionType::String`].
    fn map_native_type(&self, native: &str) -> DimensionType {
        helpers::lookup_native_type(self.native_types(), native)
    }

    /// Where result column types come from.
    fn result_schema(&self) -> ResultSchema {
        ResultSchema::ResultMetadata
    }

    /// How one table's columns are fetched.
    fn catalog_source(&self) -> CatalogSource {
        CatalogSource::InformationSchema
    }

    /// Metadata query listing a table's columns.
    ///
    /// Returns `column_name` and `data_type`, in ordinal order.
    fn table_columns_sql(&self, database: &str, schema: &str, table: &str) -> String {
        format!(
            "SELECT column_name, data_type FROM {}.information_schema.columns \
             WHERE table_schema = {} AND table_name = {} ORDER BY ordinal_position",
            self.quote_identifier(database),
            self.quote_string(schema),
            self.quote_string(table)
        )
    }
}

/// Supported warehouse dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Redshift,
    BigQuery,
    Snowflake,
    DuckDb,
    Databricks,
}

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::Postgres,
        Dialect::Redshift,
        Dialect::BigQuery,
        Dialect::Snowflake,
        Dialect::DuckDb,
        Dialect::Databricks,
    ];

    /// Build the dialect implementation.
    pub fn build(&self, start_of_week: Option<WeekDay>) -> Box<dyn SqlDialect> {
        match self {
            Dialect::Postgres => Box::new(Postgres::new(start_of_week)),
            Dialect::Redshift => Box::new(Redshift::new(start_of_week)),
            Dialect::BigQuery => Box::new(BigQuery::new(start_of_week)),
            Dialect::Snowflake => Box::new(Snowflake::new(start_of_week)),
            Dialect::DuckDb => Box::new(DuckDb::new(start_of_week)),
            Dialect::Databricks => Box::new(Databricks::new(start_of_week)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Redshift => "redshift",
            Dialect::BigQuery => "bigquery",
            Dialect::Snowflake => "snowflake",
            Dialect::DuckDb => "duckdb",
            Dialect::Databricks => "databricks",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
