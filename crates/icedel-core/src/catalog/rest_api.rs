//! Iceberg REST API types.
//!
//! Only the subset of the Apache Iceberg REST Catalog API needed to load a
//! table and commit a new snapshot to it.
//! See: https://iceberg.apache.org/spec/#iceberg-rest-catalog-api

use crate::catalog::snapshot_ids::SnapshotId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Catalog configuration response (`GET /v1/config`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfigResponse {
    /// Default configuration values
    #[serde(default)]
    pub defaults: HashMap<String, String>,
    /// Override configuration values
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

impl CatalogConfigResponse {
    /// The warehouse prefix the catalog wants in table URLs.
    pub fn prefix(&self) -> Option<&str> {
        self.overrides.get("prefix").map(String::as_str)
    }
}

/// Load table response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTableResponse {
    /// Metadata location
    #[serde(rename = "metadata-location")]
    pub metadata_location: Option<String>,
    /// Table metadata
    pub metadata: TableMetadata,
    /// Configuration overrides
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Format version (1 or 2)
    #[serde(rename = "format-version")]
    pub format_version: i32,
    /// Table UUID
    #[serde(rename = "table-uuid")]
    pub table_uuid: String,
    /// Table location
    pub location: String,
    /// Highest sequence number assigned so far
    #[serde(default, rename = "last-sequence-number")]
    pub last_sequence_number: i64,
    /// Last updated timestamp (ms)
    #[serde(default, rename = "last-updated-ms")]
    pub last_updated_ms: i64,
    /// Last column ID assigned
    #[serde(rename = "last-column-id")]
    pub last_column_id: i32,
    /// Current schema ID
    #[serde(rename = "current-schema-id")]
    pub current_schema_id: i32,
    /// All schemas (version history)
    #[serde(default)]
    pub schemas: Vec<Schema>,
    /// Default spec ID
    #[serde(default, rename = "default-spec-id")]
    pub default_spec_id: i32,
    /// Partition specs
    #[serde(default, rename = "partition-specs")]
    pub partition_specs: Vec<PartitionSpec>,
    /// Last partition ID assigned
    #[serde(default, rename = "last-partition-id")]
    pub last_partition_id: i32,
    /// Table properties
    #[serde(default)]
    pub properties: HashMap<String, String>,
    /// Current snapshot ID
    #[serde(
        default,
        rename = "current-snapshot-id",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_snapshot_id: Option<SnapshotId>,
    /// Snapshots
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    /// Snapshot log
    #[serde(default, rename = "snapshot-log")]
    pub snapshot_log: Vec<SnapshotLogEntry>,
}

impl TableMetadata {
    /// Current snapshot ID, treating the v1 `-1` placeholder as "no snapshot".
    pub fn current_snapshot_id(&self) -> Option<&SnapshotId> {
        self.current_snapshot_id
            .as_ref()
            .filter(|id| !id.is_no_snapshot())
    }

    /// The snapshot `current-snapshot-id` points at, if present in `snapshots`.
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        let current = self.current_snapshot_id()?;
        self.snapshots.iter().find(|s| &s.snapshot_id == current)
    }
}

/// Iceberg schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Schema ID
    #[serde(rename = "schema-id")]
    pub schema_id: i32,
    /// Schema type (always "struct")
    #[serde(rename = "type", default = "default_struct_type")]
    pub r#type: String,
    /// Schema fields
    pub fields: Vec<SchemaField>,
    /// Identifier field IDs
    #[serde(default, rename = "identifier-field-ids")]
    pub identifier_field_ids: Vec<i32>,
}

fn default_struct_type() -> String {
    "struct".to_string()
}

/// Schema field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field ID
    pub id: i32,
    /// Field name
    pub name: String,
    /// Field type (primitive or nested)
    #[serde(rename = "type")]
    pub field_type: serde_json::Value,
    /// Whether field is required
    pub required: bool,
    /// Documentation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// Partition spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionSpec {
    /// Spec ID
    #[serde(rename = "spec-id")]
    pub spec_id: i32,
    /// Partition fields
    #[serde(default)]
    pub fields: Vec<PartitionField>,
}

/// Partition field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionField {
    /// Source field ID
    #[serde(rename = "source-id")]
    pub source_id: i32,
    /// Field ID in partition spec
    #[serde(rename = "field-id")]
    pub field_id: i32,
    /// Partition field name
    pub name: String,
    /// Transform (identity, bucket, truncate, year, month, day, hour)
    pub transform: String,
}

/// Snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot ID
    #[serde(rename = "snapshot-id")]
    pub snapshot_id: SnapshotId,
    /// Parent snapshot ID, absent (never null) for the first snapshot
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "parent-snapshot-id"
    )]
    pub parent_snapshot_id: Option<SnapshotId>,
    /// Sequence number
    #[serde(rename = "sequence-number")]
    pub sequence_number: i64,
    /// Timestamp (ms)
    #[serde(rename = "timestamp-ms")]
    pub timestamp_ms: i64,
    /// Snapshot summary
    pub summary: SnapshotSummary,
    /// Manifest list location
    #[serde(rename = "manifest-list")]
    pub manifest_list: String,
    /// Schema ID
    #[serde(skip_serializing_if = "Option::is_none", rename = "schema-id")]
    pub schema_id: Option<i32>,
}

/// Snapshot summary: the operation plus string-valued counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    /// Operation (append, overwrite, delete, replace)
    pub operation: String,
    /// Everything else, values are decimal strings for counters
    #[serde(flatten)]
    pub properties: BTreeMap<String, String>,
}

/// Snapshot log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLogEntry {
    /// Snapshot ID
    #[serde(rename = "snapshot-id")]
    pub snapshot_id: SnapshotId,
    /// Timestamp (ms)
    #[serde(rename = "timestamp-ms")]
    pub timestamp_ms: i64,
}

/// Commit table request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitTableRequest {
    /// Requirements for optimistic concurrency
    pub requirements: Vec<TableRequirement>,
    /// Updates to apply
    pub updates: Vec<TableUpdate>,
}

/// Table requirement for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TableRequirement {
    /// Assert ref snapshot ID (for branches/tags)
    #[serde(rename = "assert-ref-snapshot-id")]
    AssertRefSnapshotId {
        #[serde(rename = "ref")]
        ref_name: String,
        #[serde(rename = "snapshot-id")]
        snapshot_id: SnapshotId,
    },
}

/// Table update operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum TableUpdate {
    /// Add snapshot
    #[serde(rename = "add-snapshot")]
    AddSnapshot { snapshot: Snapshot },
    /// Set snapshot ref (branch or tag)
    #[serde(rename = "set-snapshot-ref")]
    SetSnapshotRef {
        #[serde(rename = "ref-name")]
        ref_name: String,
        #[serde(rename = "type")]
        ref_type: String,
        #[serde(rename = "snapshot-id")]
        snapshot_id: SnapshotId,
    },
}
