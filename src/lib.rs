//! # Quarry
//!
//! Compiles metric queries over explores into warehouse SQL and runs them
//! through per-dialect warehouse clients.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Explore + CompiledMetricQuery (model)           │
//! │  (tables, joins, dimensions, metrics, filter trees)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compile]
//! ┌─────────────────────────────────────────────────────────┐
//! │              SQL for one dialect (sql)                   │
//! │  (quoting, aggregates, filter predicates, type tables)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [warehouse]
//! ┌─────────────────────────────────────────────────────────┐
//! │      WarehouseClient: run_query → RowStream              │
//! │                       get_catalog → WarehouseCatalog     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [worker]
//! ┌─────────────────────────────────────────────────────────┐
//! │            Database worker (NDJSON over stdio)           │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod compile;
pub mod config;
pub mod model;
pub mod sql;
pub mod warehouse;
pub mod worker;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{build_query, CompileError, CompiledQuery};
    pub use crate::model::{
        CompiledMetricQuery, CompiledTable, Dimension, DimensionType, Explore, FilterGroup,
        FilterOperator, FilterRule, Metric, MetricType, SortField,
    };
    pub use crate::sql::{Dialect, SqlDialect};
    pub use crate::warehouse::{
        connect_warehouse, CellValue, Row, RowStream, WarehouseClient, WarehouseError,
    };
}

pub use sql::Dialect;
