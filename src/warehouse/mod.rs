//! Warehouse clients.
//!
//! A [`WarehouseClient`] pairs a dialect with a session connector:
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────┐      ┌─────────────┐
//! │ SqlWarehouseClient<D>│ ───► │ SessionConnector │ ───► │  Warehouse  │
//! │  (dialect D)         │      │ WarehouseSession │      │  (backend)  │
//! └──────────────────────┘      └──────────────────┘      └─────────────┘
//!          │
//!          ├── run_query   → RowStream (bounded, cancellable)
//!          └── get_catalog → WarehouseCatalog
//! ```
//!
//! # Example
//!
//! ```ignore
//! use futures::TryStreamExt;
//! use quarry::warehouse::connect_warehouse;
//!
//! let client = connect_warehouse(&credentials, connector, &settings);
//! let mut rows = client.run_query("SELECT 1 AS one").await?;
//! while let Some(row) = rows.try_next().await? {
//!     println!("{:?}", row.get("one"));
//! }
//! ```

mod catalog;
mod cell;
mod client;
mod error;
mod session;
mod stream;

pub use catalog::{
    fetch_catalog, fetch_table, map_columns, merge_catalog, CatalogOptions, CatalogRequest,
    TableColumns, WarehouseCatalog,
};
pub use cell::{normalize_cell, CellValue, Row, RowDecoder};
pub use client::{
    connect_warehouse, BigQueryWarehouseClient, ClientOptions, DatabricksWarehouseClient,
    DuckDbWarehouseClient, PostgresWarehouseClient, RedshiftWarehouseClient,
    SnowflakeWarehouseClient, SqlWarehouseClient, WarehouseClient,
};
pub use error::{WarehouseError, WarehouseResult};
pub use session::{
    CursorRequest, NativeColumn, OpenCursor, ResultPage, SessionConnector, TableRef,
    WarehouseSession,
};
pub use stream::{QueryResults, QueryState, ResultField, RowStream, StreamOptions};
