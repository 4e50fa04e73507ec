//! Error types for icedel core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.

use thiserror::Error;

/// Result type alias for icedel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for icedel.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied an invalid table, column, operator or filter shape
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Delete would touch more rows than allowed
    #[error("Delete would affect {count} rows, exceeding limit of {limit}")]
    ResourceLimit { count: usize, limit: usize },

    /// Another writer committed since our metadata read
    #[error("Conflict: table was modified concurrently")]
    Conflict,

    /// Conflict retries exhausted
    #[error("Max retry count exceeded due to concurrent modifications ({attempts} attempts)")]
    MaxRetriesExceeded { attempts: u32 },

    /// REST catalog error
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Query engine error
    #[error("Query engine error: {0}")]
    QueryEngine(#[from] QueryEngineError),

    /// Manifest or manifest list codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Delete file could not be materialized
    #[error("Delete file error: {0}")]
    DeleteFile(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the failed attempt may be repeated from a fresh metadata read.
    ///
    /// Only a structured catalog conflict qualifies.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict)
    }
}

/// Caller-side validation failures. Never retried, never preceded by a write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Table is not on the allow-list
    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    /// Column is not on the table's allow-list
    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    /// Operator is not one of the supported filter operators
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    /// `in` used with a scalar value
    #[error("IN operator requires an array value for column: {0}")]
    InRequiresArray(String),

    /// Non-`in` operator used with an array value
    #[error("Non-IN operator does not accept array value for column: {0}")]
    ArrayNotAllowed(String),

    /// Delete request without `confirm: true`
    #[error("Delete requires confirm: true")]
    NotConfirmed,

    /// Delete request with neither ids nor filters
    #[error("Delete requires ids or at least one filter")]
    EmptyDelete,
}

/// REST catalog errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog returned a non-success status
    #[error("{operation} failed: {status} {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// Request could not be sent or the response could not be read
    #[error("Catalog connection failed: {0}")]
    Connection(String),

    /// Response body did not match the expected shape
    #[error("Invalid catalog response: {0}")]
    InvalidResponse(String),
}

impl CatalogError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A single structured failure reported by the query engine.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EngineMessage {
    /// Engine error code
    pub code: i64,
    /// Human-readable message
    pub message: String,
}

/// Query engine errors.
#[derive(Error, Debug)]
pub enum QueryEngineError {
    /// HTTP request failed with a non-success status
    #[error("Query request failed: {status} {body}")]
    Request { status: u16, body: String },

    /// Engine reported structured failures
    #[error("Query error: {}", join_messages(.0))]
    Engine(Vec<EngineMessage>),

    /// Request could not be sent or the response could not be read
    #[error("Query engine connection failed: {0}")]
    Connection(String),
}

fn join_messages(messages: &[EngineMessage]) -> String {
    messages
        .iter()
        .map(|m| m.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Binary manifest codec errors.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Schema definition failed to parse
    #[error("Invalid schema: {0}")]
    Schema(String),

    /// Encoding a record failed
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Container or record could not be decoded
    #[error("Malformed {file}: {message}")]
    Decode { file: &'static str, message: String },
}

// Conversion implementations for external error types

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("invalid value".into());
        assert_eq!(err.to_string(), "Configuration error: invalid value");

        let err: Error = ValidationError::InvalidColumn("nope".into()).into();
        assert_eq!(
            err.to_string(),
            "Validation error: Invalid column name: nope"
        );
    }

    #[test]
    fn test_resource_limit_names_count_and_limit() {
        let err = Error::ResourceLimit {
            count: 50001,
            limit: 50000,
        };
        let msg = err.to_string();
        assert!(msg.contains("50001"));
        assert!(msg.contains("50000"));
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(Error::Conflict.is_retryable());
        assert!(!Error::MaxRetriesExceeded { attempts: 3 }.is_retryable());

        // A message mentioning conflicts is not a conflict
        let err: Error = CatalogError::Status {
            operation: "Commit".into(),
            status: 500,
            body: "Conflict resolver crashed".into(),
        }
        .into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_engine_messages_joined() {
        let err = QueryEngineError::Engine(vec![
            EngineMessage {
                code: 1,
                message: "bad column".into(),
            },
            EngineMessage {
                code: 2,
                message: "bad table".into(),
            },
        ]);
        assert_eq!(err.to_string(), "Query error: bad column, bad table");
    }

    #[test]
    fn test_catalog_status() {
        let err = CatalogError::Status {
            operation: "Load table horse_racing.horse_info".into(),
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("404 not found"));
        assert_eq!(CatalogError::Connection("x".into()).status(), None);
    }
}
