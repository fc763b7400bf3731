//! Metric query compilation.
//!
//! This module turns a [`CompiledMetricQuery`](crate::model::CompiledMetricQuery)
//! over an [`Explore`](crate::model::Explore) into warehouse SQL:
//!
//! ```text
//! Explore + CompiledMetricQuery → resolve fields → filter trees → SQL
//! ```
//!
//! # Example
//!
//! ```ignore
//! use quarry::compile::build_query;
//! use quarry::sql::Dialect;
//!
//! let dialect = Dialect::Postgres.build(None);
//! let compiled = build_query(&explore, &query, dialect.as_ref())?;
//! println!("{}", compiled.query);
//! ```
//!
//! Compilation is pure: the same inputs always produce byte-identical SQL.

mod filter_tree;
mod query_builder;

pub use filter_tree::{compile_filter_group, FieldResolver, ResolvedField};
pub use query_builder::{build_query, CompiledQuery};

use std::fmt;

use crate::model::types::DimensionType;

// ============================================================================
// Error Types
// ============================================================================

/// Which kind of field a reference was expected to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Dimension,
    Metric,
    /// A sort must reference a selected dimension or metric.
    SelectedField,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Dimension => f.write_str("dimension"),
            FieldKind::Metric => f.write_str("metric"),
            FieldKind::SelectedField => f.write_str("selected field"),
        }
    }
}

/// Errors that can occur during compilation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("Tried to reference {kind} with unknown field id: {field_id}")]
    FieldReference { kind: FieldKind, field_id: String },

    #[error("Unknown table '{table}' referenced in {context}")]
    UnknownTableReference { table: String, context: String },

    #[error("Operator '{operator}' is not supported for {field_type} field {field_id}")]
    UnsupportedOperator {
        field_id: String,
        operator: &'static str,
        field_type: DimensionType,
    },

    #[error("Invalid value for filter on {field_id}: {message}")]
    InvalidFilterValue { field_id: String, message: String },

    #[error("Filter on {field_id} uses '{operator}' but the query has no reference time")]
    MissingReferenceTime {
        field_id: String,
        operator: &'static str,
    },

    #[error("Query selects no dimensions or metrics")]
    EmptyQuery,
}

impl CompileError {
    pub fn unknown_field(kind: FieldKind, field_id: impl Into<String>) -> Self {
        CompileError::FieldReference {
            kind,
            field_id: field_id.into(),
        }
    }

    /// The field id named by a field reference error.
    pub fn field_id(&self) -> Option<&str> {
        match self {
            CompileError::FieldReference { field_id, .. }
            | CompileError::UnsupportedOperator { field_id, .. }
            | CompileError::InvalidFilterValue { field_id, .. }
            | CompileError::MissingReferenceTime { field_id, .. } => Some(field_id),
            _ => None,
        }
    }

    pub fn is_field_reference(&self) -> bool {
        matches!(self, CompileError::FieldReference { .. })
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
