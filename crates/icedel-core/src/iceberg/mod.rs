//! Iceberg table-format metadata written by a delete commit.
//!
//! - Manifest and manifest-list Avro codecs
//! - Snapshot id generation and delete snapshot construction

pub mod manifest;
pub mod manifest_list;
pub mod snapshot;

pub use manifest::{
    build_delete_manifest_entry, decode_manifest, encode_manifest, DataFile,
    DeleteManifestEntryArgs, ManifestEntry,
};
pub use manifest_list::{decode_manifest_list, encode_manifest_list, ManifestListEntry};
pub use snapshot::{build_delete_snapshot, generate_snapshot_id, DeleteSnapshotArgs};
