//! Iceberg REST catalog access.
//!
//! - Wire types for load and commit ([`rest_api`])
//! - Snapshot id handling across the JSON boundary ([`snapshot_ids`])
//! - The [`TableCatalog`] trait and its REST implementation ([`client`])

pub mod client;
pub mod rest_api;
pub mod snapshot_ids;

pub use client::{
    fetch_catalog_prefix, CommitOutcome, RestCatalogClient, RestClientConfig, TableCatalog,
    TableIdentifier,
};
pub use rest_api::{
    CatalogConfigResponse, CommitTableRequest, LoadTableResponse, Snapshot, SnapshotSummary,
    TableMetadata, TableRequirement, TableUpdate,
};
pub use snapshot_ids::{numberify_snapshot_ids, stringify_snapshot_ids, SnapshotId};
