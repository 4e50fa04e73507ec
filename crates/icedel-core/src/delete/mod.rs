//! Equality delete write path.
//!
//! - [`writer`]: delete file materialization
//! - [`storage`]: object store access for data and metadata files
//! - [`orchestrator`]: the load, write, commit and retry pipeline

pub mod orchestrator;
pub mod storage;
pub mod writer;

pub use orchestrator::{
    delete_file_path, manifest_list_path, manifest_path, DeleteOrchestrator,
    DeleteOrchestratorBuilder, DeleteOutcome, DeleteRequest, DeleteResult, DeleteStats,
    DeleteTarget, QueryRequest, MAIN_BRANCH,
};
pub use storage::{create_object_store, get_file, put_file, to_object_key};
pub use writer::{DeleteFile, DeleteFileSession, DeleteFileWriter, ParquetDeleteFileWriter};
