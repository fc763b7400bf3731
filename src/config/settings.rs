//! TOML-based configuration for Quarry.
//!
//! Supports a config file (quarry.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [warehouses.analytics]
//! type = "postgres"
//! host = "db.internal"
//! user = "analyst"
//! password = "${ANALYTICS_DB_PASSWORD}"
//! dbname = "analytics"
//! timeout_seconds = 300
//! retries = 2
//!
//! [warehouses.lake]
//! type = "bigquery"
//! project = "my-project"
//! start_of_week = 6  # Sunday
//!
//! [worker]
//! path = "./quarry-worker"
//! timeout_seconds = 60
//!
//! [worker.pool]
//! max_idle_conns = 5
//! max_open_conns = 10
//!
//! [streaming]
//! page_size = 500
//! buffered_pages = 2
//!
//! [catalog]
//! concurrency = 8
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::credentials::WarehouseCredentials;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(String),

    #[error("No warehouses configured")]
    NoWarehouses,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named warehouses.
    pub warehouses: BTreeMap<String, WarehouseCredentials>,

    /// Worker configuration.
    pub worker: WorkerSettings,

    /// Result streaming.
    pub streaming: StreamingSettings,

    /// Catalog introspection.
    pub catalog: CatalogSettings,
}

/// Worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Path to the worker binary.
    pub path: Option<String>,

    /// Limit on a single worker request.
    pub timeout_seconds: u64,

    /// Connection pool settings.
    pub pool: PoolSettings,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            path: None,
            timeout_seconds: 30,
            pool: PoolSettings::default(),
        }
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of idle connections per pool.
    pub max_idle_conns: u32,

    /// Maximum number of open connections per pool.
    pub max_open_conns: u32,

    /// Maximum connection lifetime (e.g., "5m", "1h").
    pub conn_max_lifetime: String,

    /// Maximum connection idle time (e.g., "1m", "30s").
    pub conn_max_idle_time: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle_conns: 5,
            max_open_conns: 10,
            conn_max_lifetime: "5m".to_string(),
            conn_max_idle_time: "1m".to_string(),
        }
    }
}

impl PoolSettings {
    /// Convert to worker command-line arguments.
    pub fn to_worker_args(&self) -> Vec<String> {
        vec![
            "-pool".to_string(),
            format!("-pool-max-idle={}", self.max_idle_conns),
            format!("-pool-max-open={}", self.max_open_conns),
            format!("-pool-conn-lifetime={}", self.conn_max_lifetime),
            format!("-pool-conn-idle={}", self.conn_max_idle_time),
        ]
    }
}

/// Result streaming settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Rows fetched per page.
    pub page_size: usize,

    /// Pages buffered ahead of the consumer.
    pub buffered_pages: usize,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            page_size: 500,
            buffered_pages: 2,
        }
    }
}

/// Catalog introspection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Table fetches in flight per database.
    pub concurrency: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `QUARRY_CONFIG`
    /// 2. `./quarry.toml`
    /// 3. `~/.config/quarry/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("QUARRY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("quarry.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("quarry").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Get a warehouse by name.
    pub fn get_warehouse(&self, name: &str) -> Result<&WarehouseCredentials, SettingsError> {
        self.warehouses
            .get(name)
            .ok_or_else(|| SettingsError::WarehouseNotFound(name.to_string()))
    }

    /// The warehouse named "default", or else the first one defined.
    pub fn default_warehouse(&self) -> Result<(&str, &WarehouseCredentials), SettingsError> {
        if let Some(creds) = self.warehouses.get("default") {
            return Ok(("default", creds));
        }
        self.warehouses
            .iter()
            .next()
            .map(|(k, v)| (k.as_str(), v))
            .ok_or(SettingsError::NoWarehouses)
    }

    /// Resolve a warehouse by name, falling back to the default one.
    pub fn warehouse(
        &self,
        name: Option<&str>,
    ) -> Result<(String, &WarehouseCredentials), SettingsError> {
        match name {
            Some(name) => Ok((name.to_string(), self.get_warehouse(name)?)),
            None => self
                .default_warehouse()
                .map(|(name, creds)| (name.to_string(), creds)),
        }
    }

    /// Get the worker binary path.
    ///
    /// Returns the configured path, or searches common locations and PATH.
    pub fn worker_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.worker.path {
            let expanded = expand_env_vars(path).ok()?;
            return Some(PathBuf::from(expanded));
        }

        let candidates = [
            "quarry-worker",
            "./quarry-worker",
            "./worker/quarry-worker",
        ];

        for candidate in candidates {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(output) = std::process::Command::new("which")
            .arg("quarry-worker")
            .output()
        {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(PathBuf::from(path));
                }
            }
        }

        None
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // A lone $ is kept.
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
