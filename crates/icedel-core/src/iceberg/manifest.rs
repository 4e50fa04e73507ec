//! Manifest files: Avro containers of [`ManifestEntry`] records.
//!
//! A delete manifest lists the equality delete files added by one snapshot.

use crate::catalog::SnapshotId;
use crate::{CodecError, Result};
use apache_avro::{from_value, Reader, Schema, Writer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entry status: file added by this snapshot.
pub const STATUS_ADDED: i32 = 1;

/// Data file content: rows.
pub const CONTENT_DATA: i32 = 0;

/// Data file content: equality deletes.
pub const CONTENT_EQUALITY_DELETES: i32 = 2;

/// File format name written into `data_file.file_format`.
pub const FILE_FORMAT_PARQUET: &str = "PARQUET";

const MANIFEST_ENTRY_SCHEMA: &str = r#"{
    "type": "record",
    "name": "manifest_entry",
    "fields": [
        {"name": "status", "type": "int", "field-id": 0},
        {"name": "snapshot_id", "type": "long", "field-id": 1},
        {"name": "sequence_number", "type": "long", "field-id": 3},
        {"name": "data_file", "field-id": 2, "type": {
            "type": "record",
            "name": "r2",
            "fields": [
                {"name": "content", "type": "int", "field-id": 134},
                {"name": "file_path", "type": "string", "field-id": 100},
                {"name": "file_format", "type": "string", "field-id": 101},
                {"name": "record_count", "type": "long", "field-id": 103},
                {"name": "file_size_in_bytes", "type": "long", "field-id": 104},
                {"name": "equality_ids", "field-id": 135, "default": null,
                 "type": ["null", {"type": "array", "items": "int", "element-id": 136}]},
                {"name": "partition", "field-id": 102, "default": {},
                 "type": {"type": "map", "values": "string"}}
            ]
        }}
    ]
}"#;

/// One manifest record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// 0 existing, 1 added, 2 deleted
    pub status: i32,
    /// Snapshot that added the file
    pub snapshot_id: i64,
    /// Data sequence number of the file
    pub sequence_number: i64,
    /// The file this entry tracks
    pub data_file: DataFile,
}

/// File described by a manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFile {
    /// 0 data, 1 position deletes, 2 equality deletes
    pub content: i32,
    /// Absolute file path
    pub file_path: String,
    /// File format, e.g. `PARQUET`
    pub file_format: String,
    /// Number of rows in the file
    pub record_count: i64,
    /// File size in bytes
    pub file_size_in_bytes: i64,
    /// Field ids compared by an equality delete
    #[serde(default)]
    pub equality_ids: Option<Vec<i32>>,
    /// Partition values
    #[serde(default)]
    pub partition: HashMap<String, String>,
}

/// Inputs for [`build_delete_manifest_entry`].
#[derive(Debug, Clone)]
pub struct DeleteManifestEntryArgs<'a> {
    /// Snapshot adding the delete file
    pub snapshot_id: &'a SnapshotId,
    /// Sequence number of that snapshot
    pub sequence_number: i64,
    /// Absolute path of the Parquet delete file
    pub file_path: String,
    /// Ids written to the delete file
    pub record_count: i64,
    /// Delete file size in bytes
    pub file_size_in_bytes: i64,
    /// Iceberg field id of the id column
    pub equality_field_id: i32,
}

/// Manifest entry adding a single-column equality delete file.
pub fn build_delete_manifest_entry(args: DeleteManifestEntryArgs<'_>) -> ManifestEntry {
    ManifestEntry {
        status: STATUS_ADDED,
        snapshot_id: args.snapshot_id.as_i64(),
        sequence_number: args.sequence_number,
        data_file: DataFile {
            content: CONTENT_EQUALITY_DELETES,
            file_path: args.file_path,
            file_format: FILE_FORMAT_PARQUET.to_string(),
            record_count: args.record_count,
            file_size_in_bytes: args.file_size_in_bytes,
            equality_ids: Some(vec![args.equality_field_id]),
            partition: HashMap::new(),
        },
    }
}

fn schema() -> Result<Schema> {
    Schema::parse_str(MANIFEST_ENTRY_SCHEMA).map_err(|e| CodecError::Schema(e.to_string()).into())
}

/// Encode entries as an Avro object container, one record per entry.
pub fn encode_manifest(entries: &[ManifestEntry]) -> Result<Vec<u8>> {
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

/// Decode an Avro manifest container.
///
/// Fields missing from the writer's schema take their declared defaults.
pub fn decode_manifest(bytes: &[u8]) -> Result<Vec<ManifestEntry>> {
    let schema = schema()?;
    let reader = Reader::with_schema(&schema, bytes).map_err(malformed)?;

    let mut entries = Vec::new();
    for value in reader {
        let value = value.map_err(malformed)?;
        entries.push(from_value::<ManifestEntry>(&value).map_err(malformed)?);
    }
    Ok(entries)
}

fn malformed(err: apache_avro::Error) -> CodecError {
    CodecError::Decode {
        file: "manifest",
        message: err.to_string(),
    }
}
