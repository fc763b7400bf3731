//! Worker-specific error types.

use std::io;
use thiserror::Error;

use crate::warehouse::WarehouseError;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur during worker communication.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to spawn the worker process.
    #[error("failed to spawn worker process: {0}")]
    SpawnFailed(#[source] io::Error),

    /// Failed to write to worker stdin.
    #[error("failed to write to worker: {0}")]
    WriteFailed(#[source] io::Error),

    /// Failed to serialize request to JSON.
    #[error("failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// Failed to deserialize response from JSON.
    #[error("failed to deserialize response: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// Request timed out waiting for response.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Worker process exited unexpectedly.
    #[error("worker process exited unexpectedly")]
    WorkerExited,

    /// Response channel was closed (internal error).
    #[error("response channel closed unexpectedly")]
    ChannelClosed,

    /// Worker returned an error response.
    #[error("worker error: {message} (code: {code})")]
    Remote {
        /// Error code from worker.
        code: String,
        /// Error message from worker.
        message: String,
    },

    /// Database driver not found.
    #[error("database driver not found: {0}")]
    DriverNotFound(String),

    /// Database connection failed.
    #[error("database connection failed: {0}")]
    ConnectionFailed(String),

    /// The requested table or cursor does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend rejected or failed the statement.
    #[error("{0}")]
    QueryFailed(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Method not found.
    #[error("method not found: {0}")]
    MethodNotFound(String),
}

impl WorkerError {
    /// Create a remote error from an error response.
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Check if this error indicates the worker has exited.
    pub fn is_worker_exited(&self) -> bool {
        matches!(self, Self::WorkerExited | Self::ChannelClosed)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Errors that make the session unusable rather than failing one statement.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed(_)
                | Self::WriteFailed(_)
                | Self::WorkerExited
                | Self::ChannelClosed
                | Self::DriverNotFound(_)
                | Self::ConnectionFailed(_)
        )
    }

    /// Label the error as a connection or query error for `backend`.
    pub fn into_warehouse(self, backend: &str) -> WarehouseError {
        match self {
            err if err.is_connection() => WarehouseError::connection(backend, err.to_string()),
            Self::Timeout(secs) => {
                WarehouseError::query_timeout(std::time::Duration::from_secs(secs))
            }
            Self::QueryFailed(message) => WarehouseError::Query(message),
            Self::Remote { message, .. } => WarehouseError::Query(message),
            other => WarehouseError::Query(other.to_string()),
        }
    }
}
