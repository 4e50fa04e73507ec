//! Configuration structures for icedel.
//!
//! Configuration is loaded from TOML files and can be overridden via CLI flags.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// REST catalog configuration
    pub catalog: CatalogConfig,

    /// Query engine configuration
    pub query_engine: QueryEngineConfig,

    /// Object storage configuration
    pub storage: StorageConfig,

    /// Delete behaviour
    pub delete: DeleteConfig,

    /// Extra or overriding per-table column allow-lists
    #[serde(default)]
    pub tables: HashMap<String, TableColumnsConfig>,

    /// Monitoring configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// REST catalog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Catalog base URI
    pub uri: String,

    /// Warehouse identifier sent to the config endpoint
    pub warehouse: String,

    /// Bearer token
    pub token: String,

    /// Resolve the effective warehouse prefix via `GET /v1/config`
    #[serde(default = "default_true")]
    pub resolve_prefix: bool,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

/// Query engine (SQL over HTTP) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryEngineConfig {
    /// API endpoint, e.g. `https://api.sql.cloudflarestorage.com/api/v1/accounts`
    pub endpoint: String,

    /// Account identifier
    pub account_id: String,

    /// Bucket the tables live in
    pub bucket_name: String,

    /// Bearer token
    pub token: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

/// Object storage configuration.
///
/// Either `local_path` (development) or `bucket` (S3-compatible) must be set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Bucket name
    pub bucket: Option<String>,

    /// Region
    pub region: Option<String>,

    /// Endpoint for S3-compatible storage (R2, MinIO)
    pub endpoint: Option<String>,

    /// Access key ID
    pub access_key_id: Option<String>,

    /// Secret access key
    pub secret_access_key: Option<String>,

    /// Local directory used instead of a bucket
    pub local_path: Option<PathBuf>,
}

/// Delete behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeleteConfig {
    /// Namespace holding the tables
    pub namespace: String,

    /// Column the equality delete matches on
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Iceberg field id of `id_column`
    #[serde(default = "default_id_field_id")]
    pub id_field_id: i32,

    /// Largest number of rows a single delete may touch
    #[serde(default = "default_max_delete_rows")]
    pub max_delete_rows: usize,

    /// Total attempts (first try included) on commit conflicts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl DeleteConfig {
    /// Delete settings for a namespace with all other values defaulted.
    pub fn for_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id_column: default_id_column(),
            id_field_id: default_id_field_id(),
            max_delete_rows: default_max_delete_rows(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Column allow-list for one table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TableColumnsConfig {
    /// Queryable column names
    pub columns: Vec<String>,
}

/// Monitoring configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// Filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Plain text format
    Text,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_request_timeout_seconds() -> u64 {
    30
}
fn default_id_column() -> String {
    "id".to_string()
}
fn default_id_field_id() -> i32 {
    2
}
fn default_max_delete_rows() -> usize {
    50_000
}
fn default_max_attempts() -> u32 {
    3
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.catalog.uri.is_empty() {
            return Err(crate::Error::Config("Catalog URI is required".into()));
        }

        if self.catalog.warehouse.is_empty() {
            return Err(crate::Error::Config("Catalog warehouse is required".into()));
        }

        if self.delete.namespace.is_empty() {
            return Err(crate::Error::Config("Delete namespace is required".into()));
        }

        if self.delete.max_delete_rows == 0 {
            return Err(crate::Error::Config(
                "max_delete_rows must be greater than zero".into(),
            ));
        }

        if self.delete.max_attempts == 0 {
            return Err(crate::Error::Config(
                "max_attempts must be greater than zero".into(),
            ));
        }

        if self.storage.bucket.is_none() && self.storage.local_path.is_none() {
            return Err(crate::Error::Config(
                "Storage requires either bucket or local_path".into(),
            ));
        }

        for (table, columns) in &self.tables {
            if !columns.columns.contains(&self.delete.id_column) {
                return Err(crate::Error::Config(format!(
                    "Table {} does not expose id column {}",
                    table, self.delete.id_column
                )));
            }
        }

        if self.catalog.token.is_empty() {
            tracing::warn!("Catalog token is empty; requests will likely be rejected");
        }

        Ok(())
    }
}
