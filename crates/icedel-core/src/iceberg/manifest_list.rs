//! Manifest lists: Avro containers of [`ManifestListEntry`] records.
//!
//! A snapshot's manifest list names every manifest that makes up the table at
//! that snapshot. New snapshots copy the parent's entries and append their own.

use crate::{CodecError, Result};
use apache_avro::{from_value, Reader, Schema, Writer};
use serde::{Deserialize, Serialize};

/// Manifest content: data files.
pub const MANIFEST_CONTENT_DATA: i32 = 0;

/// Manifest content: delete files.
pub const MANIFEST_CONTENT_DELETES: i32 = 1;

const MANIFEST_FILE_SCHEMA: &str = r#"{
    "type": "record",
    "name": "manifest_file",
    "fields": [
        {"name": "manifest_path", "type": "string", "field-id": 500},
        {"name": "manifest_length", "type": "long", "field-id": 501},
        {"name": "partition_spec_id", "type": "int", "field-id": 502},
        {"name": "content", "type": "int", "field-id": 517},
        {"name": "sequence_number", "type": "long", "field-id": 515},
        {"name": "min_sequence_number", "type": "long", "field-id": 516},
        {"name": "added_snapshot_id", "type": "long", "field-id": 503},
        {"name": "added_data_files_count", "type": "int", "default": 0, "field-id": 504},
        {"name": "existing_data_files_count", "type": "int", "default": 0, "field-id": 505},
        {"name": "deleted_data_files_count", "type": "int", "default": 0, "field-id": 506},
        {"name": "added_rows_count", "type": "long", "default": 0, "field-id": 512},
        {"name": "existing_rows_count", "type": "long", "default": 0, "field-id": 513},
        {"name": "deleted_rows_count", "type": "long", "default": 0, "field-id": 514}
    ]
}"#;

/// One manifest list record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestListEntry {
    /// Absolute path of the manifest
    pub manifest_path: String,
    /// Manifest size in bytes
    pub manifest_length: i64,
    /// Partition spec the manifest was written with
    pub partition_spec_id: i32,
    /// 0 data, 1 deletes
    pub content: i32,
    /// Sequence number of the snapshot that added the manifest
    pub sequence_number: i64,
    /// Lowest data sequence number among the manifest's files
    pub min_sequence_number: i64,
    /// Snapshot that added the manifest
    pub added_snapshot_id: i64,
    /// Files with status added
    #[serde(default)]
    pub added_data_files_count: i32,
    /// Files with status existing
    #[serde(default)]
    pub existing_data_files_count: i32,
    /// Files with status deleted
    #[serde(default)]
    pub deleted_data_files_count: i32,
    /// Rows in added files
    #[serde(default)]
    pub added_rows_count: i64,
    /// Rows in existing files
    #[serde(default)]
    pub existing_rows_count: i64,
    /// Rows in deleted files
    #[serde(default)]
    pub deleted_rows_count: i64,
}

fn schema() -> Result<Schema> {
    Schema::parse_str(MANIFEST_FILE_SCHEMA).map_err(|e| CodecError::Schema(e.to_string()).into())
}

/// Encode entries as an Avro object container, one record per entry.
pub fn encode_manifest_list(entries: &[ManifestListEntry]) -> Result<Vec<u8>> {
    let schema = schema()?;
    let mut writer = Writer::new(&schema, Vec::new());
    for entry in entries {
        writer
            .append_ser(entry)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Decode an Avro manifest list container.
pub fn decode_manifest_list(bytes: &[u8]) -> Result<Vec<ManifestListEntry>> {
    let schema = schema()?;
    let reader = Reader::with_schema(&schema, bytes).map_err(malformed)?;

    let mut entries = Vec::new();
    for value in reader {
        let value = value.map_err(malformed)?;
        entries.push(from_value::<ManifestListEntry>(&value).map_err(malformed)?);
    }
    Ok(entries)
}

fn malformed(err: apache_avro::Error) -> CodecError {
    CodecError::Decode {
        file: "manifest list",
        message: err.to_string(),
    }
}
