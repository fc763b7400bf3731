//! Warehouse credentials.
//!
//! Each `[warehouses.<name>]` table is tagged by `type`. Secrets may use
//! `${VAR}` references, which are expanded when a connection string is built.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::settings::{expand_env_vars, SettingsError};
use crate::model::types::WeekDay;
use crate::sql::dialect::Dialect;

/// Session behaviour shared by every warehouse type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Job timeout applied to each backend call.
    pub timeout_seconds: Option<u64>,

    /// Extra attempts when a connection cannot be established.
    pub retries: u32,

    /// First day of the week for week truncation (0 = Monday).
    pub start_of_week: Option<WeekDay>,
}

impl SessionPolicy {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

/// Postgres and Redshift connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PostgresCredentials {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    pub dbname: String,
    #[serde(default)]
    pub sslmode: Option<String>,
    #[serde(flatten)]
    pub policy: SessionPolicy,
}

/// BigQuery connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BigQueryCredentials {
    pub project: String,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Path to a service account key file.
    #[serde(default)]
    pub keyfile: Option<String>,
    /// Jobs that would bill more bytes than this fail without running.
    #[serde(default)]
    pub maximum_bytes_billed: Option<u64>,
    #[serde(default)]
    pub priority: Option<BigQueryPriority>,
    #[serde(flatten)]
    pub policy: SessionPolicy,
}

/// BigQuery job priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BigQueryPriority {
    #[serde(alias = "INTERACTIVE")]
    Interactive,
    #[serde(alias = "BATCH")]
    Batch,
}

impl BigQueryPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactive => "INTERACTIVE",
            Self::Batch => "BATCH",
        }
    }
}

/// Snowflake connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SnowflakeCredentials {
    pub account: String,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    pub database: String,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub policy: SessionPolicy,
}

/// DuckDB connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DuckDbCredentials {
    /// Database file, or `:memory:`.
    #[serde(default = "default_duckdb_path")]
    pub path: String,
    #[serde(flatten)]
    pub policy: SessionPolicy,
}

fn default_duckdb_path() -> String {
    ":memory:".to_string()
}

/// Databricks SQL warehouse connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabricksCredentials {
    pub host: String,
    pub http_path: String,
    pub token: String,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(flatten)]
    pub policy: SessionPolicy,
}

/// Credentials for one configured warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WarehouseCredentials {
    Postgres(PostgresCredentials),
    Redshift(PostgresCredentials),
    Bigquery(BigQueryCredentials),
    Snowflake(SnowflakeCredentials),
    Duckdb(DuckDbCredentials),
    Databricks(DatabricksCredentials),
}

impl WarehouseCredentials {
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Postgres(_) => Dialect::Postgres,
            Self::Redshift(_) => Dialect::Redshift,
            Self::Bigquery(_) => Dialect::BigQuery,
            Self::Snowflake(_) => Dialect::Snowflake,
            Self::Duckdb(_) => Dialect::DuckDb,
            Self::Databricks(_) => Dialect::Databricks,
        }
    }

    /// Driver name understood by the worker.
    pub fn driver(&self) -> &'static str {
        self.dialect().name()
    }

    pub fn policy(&self) -> &SessionPolicy {
        match self {
            Self::Postgres(c) | Self::Redshift(c) => &c.policy,
            Self::Bigquery(c) => &c.policy,
            Self::Snowflake(c) => &c.policy,
            Self::Duckdb(c) => &c.policy,
            Self::Databricks(c) => &c.policy,
        }
    }

    /// Project, host or file identifying the backend in errors.
    pub fn backend_identity(&self) -> String {
        match self {
            Self::Postgres(c) | Self::Redshift(c) => c.host.clone(),
            Self::Bigquery(c) => c.project.clone(),
            Self::Snowflake(c) => c.account.clone(),
            Self::Duckdb(c) => c.path.clone(),
            Self::Databricks(c) => c.host.clone(),
        }
    }

    /// Worker connection string, optionally targeting another database.
    ///
    /// For BigQuery the database is the project.
    pub fn connection_string(&self, database: Option<&str>) -> Result<String, SettingsError> {
        match self {
            Self::Postgres(c) => postgres_url(c, database, 5432),
            Self::Redshift(c) => postgres_url(c, database, 5439),
            Self::Bigquery(c) => {
                let project = database.unwrap_or(&c.project);
                let mut url = format!("bigquery://{}", urlencoding::encode(project));
                if let Some(location) = &c.location {
                    url.push('/');
                    url.push_str(&urlencoding::encode(location));
                }
                let mut params = Vec::new();
                if let Some(dataset) = &c.dataset {
                    params.push(format!("dataset={}", urlencoding::encode(dataset)));
                }
                if let Some(keyfile) = &c.keyfile {
                    let keyfile = expand_env_vars(keyfile)?;
                    params.push(format!("credentials_file={}", urlencoding::encode(&keyfile)));
                }
                if let Some(bytes) = c.maximum_bytes_billed {
                    params.push(format!("maximum_bytes_billed={}", bytes));
                }
                if let Some(priority) = c.priority {
                    params.push(format!("priority={}", priority.as_str()));
                }
                Ok(with_params(url, &params))
            }
            Self::Snowflake(c) => {
                let mut url = urlencoding::encode(&expand_env_vars(&c.user)?).into_owned();
                if let Some(password) = &c.password {
                    url.push(':');
                    url.push_str(&urlencoding::encode(&expand_env_vars(password)?));
                }
                url.push('@');
                url.push_str(&c.account);
                url.push('/');
                url.push_str(&urlencoding::encode(database.unwrap_or(&c.database)));
                let mut params = Vec::new();
                if let Some(warehouse) = &c.warehouse {
                    params.push(format!("warehouse={}", urlencoding::encode(warehouse)));
                }
                if let Some(role) = &c.role {
                    params.push(format!("role={}", urlencoding::encode(role)));
                }
                Ok(with_params(url, &params))
            }
            Self::Duckdb(c) => {
                if c.path.is_empty() || c.path == ":memory:" {
                    Ok(":memory:".to_string())
                } else {
                    expand_env_vars(&c.path)
                }
            }
            Self::Databricks(c) => {
                let token = expand_env_vars(&c.token)?;
                let url = format!(
                    "token:{}@{}:443/{}",
                    urlencoding::encode(&token),
                    c.host,
                    c.http_path.trim_start_matches('/')
                );
                let catalog = database.map(str::to_string).or_else(|| c.catalog.clone());
                let params: Vec<String> = catalog
                    .map(|catalog| format!("catalog={}", urlencoding::encode(&catalog)))
                    .into_iter()
                    .collect();
                Ok(with_params(url, &params))
            }
        }
    }
}

fn postgres_url(
    c: &PostgresCredentials,
    database: Option<&str>,
    default_port: u16,
) -> Result<String, SettingsError> {
    let mut url = format!("postgres://{}", urlencoding::encode(&expand_env_vars(&c.user)?));
    if let Some(password) = &c.password {
        url.push(':');
        url.push_str(&urlencoding::encode(&expand_env_vars(password)?));
    }
    url.push_str(&format!(
        "@{}:{}/{}",
        c.host,
        c.port.unwrap_or(default_port),
        urlencoding::encode(database.unwrap_or(&c.dbname))
    ));
    let params: Vec<String> = c
        .sslmode
        .iter()
        .map(|mode| format!("sslmode={}", mode))
        .collect();
    Ok(with_params(url, &params))
}

fn with_params(url: String, params: &[String]) -> String {
    if params.is_empty() {
        url
    } else {
        format!("{}?{}", url, params.join("&"))
    }
}
