//! Configuration module for Quarry.
//!
//! Handles warehouse credentials, environment variables, and settings.

mod credentials;
mod settings;

pub use credentials::{
    BigQueryCredentials, BigQueryPriority, DatabricksCredentials, DuckDbCredentials,
    PostgresCredentials, SessionPolicy, SnowflakeCredentials, WarehouseCredentials,
};
pub use settings::{
    expand_env_vars, CatalogSettings, PoolSettings, Settings, SettingsError, StreamingSettings,
    WorkerSettings,
};
