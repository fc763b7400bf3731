//! Backend session abstraction.
//!
//! A [`SessionConnector`] opens sessions against one configured backend and a
//! [`WarehouseSession`] runs statements through server-side cursors. The
//! worker process implements both; tests use in-memory implementations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::WarehouseResult;

/// A column as reported by the backend, with its native type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeColumn {
    pub name: String,
    pub data_type: String,
}

impl NativeColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A statement to open a cursor for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorRequest {
    pub sql: String,
    /// Validate and describe the statement without producing rows.
    pub dry_run: bool,
}

impl CursorRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            dry_run: false,
        }
    }

    pub fn dry_run(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            dry_run: true,
        }
    }
}

/// An open server-side cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenCursor {
    pub cursor_id: String,
    /// Result columns, when the backend reports them on open.
    pub columns: Vec<NativeColumn>,
}

/// One page of raw rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage {
    /// Positional arrays or objects keyed by column name.
    pub rows: Vec<serde_json::Value>,
    /// No rows remain after this page.
    pub done: bool,
}

/// A table addressed by its catalog triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}

impl std::str::FromStr for TableRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [database, schema, table]
                if !database.is_empty() && !schema.is_empty() && !table.is_empty() =>
            {
                Ok(Self::new(*database, *schema, *table))
            }
            _ => Err(format!("expected database.schema.table, got '{}'", s)),
        }
    }
}

/// A live connection to one backend database.
///
/// Sessions are shared across concurrent requests and must be safe for
/// concurrent use.
#[async_trait]
pub trait WarehouseSession: Send + Sync {
    /// Submit a statement and open a cursor over its results.
    async fn open_cursor(&self, request: &CursorRequest) -> WarehouseResult<OpenCursor>;

    /// Fetch up to `max_rows` rows from an open cursor.
    async fn fetch_page(&self, cursor_id: &str, max_rows: usize) -> WarehouseResult<ResultPage>;

    /// Release a cursor and its backend resources.
    async fn close_cursor(&self, cursor_id: &str) -> WarehouseResult<()>;

    /// Native column metadata for one table.
    ///
    /// Returns `Ok(None)` when the table does not exist.
    async fn table_columns(&self, table: &TableRef) -> WarehouseResult<Option<Vec<NativeColumn>>>;
}

/// Opens sessions for one configured backend.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Backend identity (project, host or file) used in connection errors.
    fn backend(&self) -> &str;

    /// Open a session, optionally against a specific database.
    async fn connect(&self, database: Option<&str>) -> WarehouseResult<Arc<dyn WarehouseSession>>;
}
