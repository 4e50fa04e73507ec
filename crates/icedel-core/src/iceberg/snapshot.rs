//! Snapshot construction for delete commits.

use crate::catalog::{Snapshot, SnapshotId, SnapshotSummary};
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::BTreeMap;

/// Snapshot operation name for row-level deletes.
pub const OPERATION_DELETE: &str = "delete";

/// Fresh random snapshot id in `[0, i64::MAX]`.
///
/// Ids are not coordinated; uniqueness rests on 63 bits of OS entropy.
pub fn generate_snapshot_id() -> SnapshotId {
    let raw = OsRng.next_u64() & i64::MAX as u64;
    SnapshotId::from(raw as i64)
}

/// Inputs for [`build_delete_snapshot`].
#[derive(Debug, Clone)]
pub struct DeleteSnapshotArgs {
    /// Id of the new snapshot
    pub snapshot_id: SnapshotId,
    /// Current snapshot before this commit, `None` for an empty table
    pub parent_snapshot_id: Option<SnapshotId>,
    /// Table's last sequence number plus one
    pub sequence_number: i64,
    /// Absolute path of the snapshot's manifest list
    pub manifest_list: String,
    /// Current table schema id
    pub schema_id: i32,
    /// Ids written to the delete file
    pub deleted_records: usize,
}

/// Build the snapshot recording one equality delete file.
pub fn build_delete_snapshot(args: DeleteSnapshotArgs) -> Snapshot {
    let properties = BTreeMap::from([
        ("deleted-data-files".to_string(), "0".to_string()),
        ("added-delete-files".to_string(), "1".to_string()),
        (
            "deleted-records".to_string(),
            args.deleted_records.to_string(),
        ),
    ]);

    Snapshot {
        snapshot_id: args.snapshot_id,
        parent_snapshot_id: args.parent_snapshot_id.filter(|id| !id.is_no_snapshot()),
        sequence_number: args.sequence_number,
        timestamp_ms: Utc::now().timestamp_millis(),
        summary: SnapshotSummary {
            operation: OPERATION_DELETE.to_string(),
            properties,
        },
        manifest_list: args.manifest_list,
        schema_id: Some(args.schema_id),
    }
}
