//! icedel core - row-level equality deletes for Iceberg tables
//!
//! Deletes rows from tables managed by an Iceberg REST catalog without
//! rewriting data files:
//!
//! - Target rows are given as ids or resolved through a SQL query engine
//! - The ids go into a Parquet equality delete file
//! - A manifest and manifest list referencing it are written as Avro
//! - A new snapshot is committed with an optimistic-concurrency assertion,
//!   retried from fresh metadata when another writer wins

pub mod catalog;
pub mod config;
pub mod delete;
pub mod error;
pub mod iceberg;
pub mod query;

// Re-export commonly used types
pub use catalog::{RestCatalogClient, SnapshotId, TableCatalog, TableIdentifier};
pub use config::Config;
pub use delete::{DeleteOrchestrator, DeleteOutcome, DeleteRequest, DeleteTarget, QueryRequest};
pub use error::{CatalogError, CodecError, QueryEngineError, ValidationError};
pub use error::{Error, Result};
pub use query::{PredicateCompiler, QueryEngine, QueryFilter, Row, TableRegistry};
