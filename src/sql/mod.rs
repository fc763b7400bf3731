//! SQL generation module.
//!
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - Warehouse dialect implementations
//! - [`metric`] - Shared aggregate expressions
//! - [`filter_rule`] - Filter rule predicates

pub mod dialect;
pub mod filter_rule;
pub mod metric;
pub mod token;


pub use dialect::{CatalogSource, Dialect, QuoteChars, ResultSchema, SqlDialect};
pub use dialect::{BigQuery, Databricks, DuckDb, Postgres, Redshift, Snowflake};
pub use filter_rule::FilterRuleRenderer;
pub use metric::default_metric_sql;
pub use token::{Token, TokenStream};
