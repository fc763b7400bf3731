//! Error types for warehouse clients.

use std::time::Duration;

use thiserror::Error;

/// Result type for warehouse operations.
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Errors surfaced by warehouse clients.
///
/// Connection errors are session or credential failures and carry the
/// backend identity (project, host or file). Query errors wrap the backend's
/// own message. Neither is retried once a session is established.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WarehouseError {
    #[error("Could not connect to {backend}: {message}")]
    Connection { backend: String, message: String },

    #[error("{0}")]
    Query(String),
}

impl WarehouseError {
    pub fn connection(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// A query that exceeded its job timeout.
    pub fn query_timeout(timeout: Duration) -> Self {
        Self::Query(format!(
            "Query exceeded the timeout of {} seconds",
            timeout.as_secs()
        ))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Prefix the message with context while keeping the error kind.
    pub fn context(self, context: &str) -> Self {
        match self {
            Self::Connection { backend, message } => Self::Connection {
                backend,
                message: format!("{}. {}", context, message),
            },
            Self::Query(message) => Self::Query(format!("{}. {}", context, message)),
        }
    }
}
