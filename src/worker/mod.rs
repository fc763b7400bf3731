//! Worker communication module.
//!
//! This module provides async communication with the database worker process.
//! The worker owns every driver and connection pool; Quarry compiles SQL and
//! hands it over, then pages results back through server-side cursors.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Quarry (Rust + Tokio)                        │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │        WorkerConnector / WorkerSession (warehouse)        │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                    WorkerClient (Async)                   │  │
//! │  │  - Spawns the worker as child process                     │  │
//! │  │  - NDJSON protocol over stdin/stdout                      │  │
//! │  │  - Request IDs for concurrent request correlation         │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                              │                                  │
//! │               stdin (NDJSON) │ stdout (NDJSON)                  │
//! │                              ▼                                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │               Worker (Long-Running Child Process)               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quarry::worker::{WorkerClient, WorkerConnector};
//! use quarry::warehouse::connect_warehouse;
//!
//! let worker = Arc::new(WorkerClient::spawn_with_settings(&settings).await?);
//! let connector = Arc::new(WorkerConnector::new(worker, credentials.clone()));
//! let client = connect_warehouse(&credentials, connector, &settings);
//!
//! // Worker is shut down when the last client is dropped
//! ```

mod client;
mod error;
pub mod protocol;
mod session;

pub use client::WorkerClient;
pub use error::{WorkerError, WorkerResult};
pub use session::{WorkerConnector, WorkerSession};
