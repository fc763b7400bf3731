//! Protocol types for worker communication.
//!
//! Every request carries the connection it runs against; the worker pools
//! connections by `(driver, connection_string)`. Cursors live in the worker
//! between `query.open` and `query.close`.

use serde::{Deserialize, Serialize};

use crate::warehouse::NativeColumn;

// ============================================================================
// Request/Response Envelope
// ============================================================================

/// Request envelope sent to the worker.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation.
    pub id: String,
    /// Method name (e.g., "query.open").
    pub method: String,
    /// Method-specific parameters.
    pub params: serde_json::Value,
}

/// Response envelope received from the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to.
    pub id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Result data (present if success = true).
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error information (present if success = false).
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

/// Error information in a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    /// Error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// Connection Parameters (included in all requests)
// ============================================================================

/// Database connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Database driver name (e.g., "postgres", "bigquery").
    pub driver: String,
    /// Driver-specific connection string.
    pub connection_string: String,
}

// ============================================================================
// Request Parameters
// ============================================================================

/// Parameters for `metadata.get_database_info`.
#[derive(Debug, Clone, Serialize)]
pub struct GetDatabaseInfoParams {
    #[serde(flatten)]
    pub connection: ConnectionParams,
}

/// Parameters for `metadata.get_columns`.
#[derive(Debug, Clone, Serialize)]
pub struct GetColumnsParams {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    /// Database (catalog or project) the table belongs to.
    pub database: String,
    /// Schema (or dataset) the table belongs to.
    pub schema: String,
    /// Table name.
    pub table: String,
}

/// Parameters for `query.open`.
#[derive(Debug, Clone, Serialize)]
pub struct OpenQueryParams {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    /// SQL statement to execute.
    pub sql: String,
    /// Describe the result without executing.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

/// Parameters for `query.fetch`.
#[derive(Debug, Clone, Serialize)]
pub struct FetchParams {
    pub cursor_id: String,
    /// Maximum rows to return.
    pub max_rows: usize,
}

/// Parameters for `query.close`.
#[derive(Debug, Clone, Serialize)]
pub struct CloseParams {
    pub cursor_id: String,
}

// ============================================================================
// Response Types
// ============================================================================

/// Database information.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseInfo {
    /// Database product name.
    pub product_name: String,
    /// Database version.
    pub product_version: String,
    /// Current database name.
    pub database_name: String,
    /// Default schema.
    #[serde(default)]
    pub default_schema: Option<String>,
}

/// Response from `metadata.get_database_info`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetDatabaseInfoResponse {
    pub database: DatabaseInfo,
}

/// Column information.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Ordinal position (1-based).
    pub position: i32,
    /// Database-specific type name.
    pub data_type: String,
    /// Whether NULL values are allowed.
    #[serde(default)]
    pub is_nullable: bool,
}

/// Response from `metadata.get_columns`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetColumnsResponse {
    pub columns: Vec<ColumnInfo>,
}

impl GetColumnsResponse {
    /// Columns in ordinal order.
    pub fn into_native(mut self) -> Vec<NativeColumn> {
        self.columns.sort_by_key(|c| c.position);
        self.columns
            .into_iter()
            .map(|c| NativeColumn::new(c.name, c.data_type))
            .collect()
    }
}

/// Column information in query results.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResultColumn {
    /// Column name or alias.
    pub name: String,
    /// Database-specific type.
    pub data_type: String,
}

impl From<QueryResultColumn> for NativeColumn {
    fn from(c: QueryResultColumn) -> Self {
        NativeColumn::new(c.name, c.data_type)
    }
}

/// Response from `query.open`.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenQueryResponse {
    pub cursor_id: String,
    /// Result columns, when the driver reports them up front.
    #[serde(default)]
    pub columns: Vec<QueryResultColumn>,
}

/// Response from `query.fetch`.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchResponse {
    /// Positional rows.
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
    /// The cursor is exhausted.
    pub done: bool,
}

// ============================================================================
// Method Names
// ============================================================================

/// Worker method names.
pub mod methods {
    pub const GET_DATABASE_INFO: &str = "metadata.get_database_info";
    pub const GET_COLUMNS: &str = "metadata.get_columns";
    pub const OPEN_QUERY: &str = "query.open";
    pub const FETCH: &str = "query.fetch";
    pub const CLOSE: &str = "query.close";
}

/// Worker error codes.
pub mod codes {
    pub const DRIVER_NOT_FOUND: &str = "DRIVER_NOT_FOUND";
    pub const CONNECTION_FAILED: &str = "CONNECTION_FAILED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const QUERY_FAILED: &str = "QUERY_FAILED";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
    pub const WORKER_EXITED: &str = "WORKER_EXITED";
}
