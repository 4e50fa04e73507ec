//! Equality delete orchestration.
//!
//! One delete attempt runs as a straight pipeline:
//!
//! 1. Load fresh table metadata from the catalog
//! 2. Resolve the target ids (given directly, or queried through filters)
//! 3. Return early on zero matches, fail on more than `max_delete_rows`
//! 4. Write the equality delete file and upload it
//! 5. Write a manifest for it and a manifest list extending the parent's
//! 6. Commit a new snapshot, asserting `main` still points at the parent
//!
//! A commit conflict discards everything from the attempt and starts over from
//! step 1, up to `max_attempts` attempts in total. Files written by a failed
//! attempt are never referenced by table metadata.

use crate::catalog::{
    CommitOutcome, CommitTableRequest, RestCatalogClient, SnapshotId, TableCatalog,
    TableIdentifier, TableMetadata, TableRequirement, TableUpdate,
};
use crate::config::{Config, DeleteConfig};
use crate::delete::storage::{create_object_store, get_file, put_file};
use crate::delete::writer::{DeleteFileWriter, ParquetDeleteFileWriter};
use crate::iceberg::manifest::{
    build_delete_manifest_entry, encode_manifest, DeleteManifestEntryArgs,
};
use crate::iceberg::manifest_list::{
    decode_manifest_list, encode_manifest_list, ManifestListEntry, MANIFEST_CONTENT_DELETES,
};
use crate::iceberg::snapshot::{build_delete_snapshot, generate_snapshot_id, DeleteSnapshotArgs};
use crate::query::{
    HttpQueryEngine, PredicateCompiler, QueryEngine, QueryFilter, Row, SelectQueryArgs,
    TableRegistry,
};
use crate::{CatalogError, Error, Result, ValidationError};
use bytes::Bytes;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Branch every delete commits to.
pub const MAIN_BRANCH: &str = "main";

/// Path of the equality delete file for a snapshot.
pub fn delete_file_path(location: &str, snapshot_id: &SnapshotId) -> String {
    format!(
        "{}/data/equality-delete-{}.parquet",
        location.trim_end_matches('/'),
        snapshot_id
    )
}

/// Path of the delete manifest for a snapshot.
pub fn manifest_path(location: &str, snapshot_id: &SnapshotId) -> String {
    format!(
        "{}/metadata/manifest-{}.avro",
        location.trim_end_matches('/'),
        snapshot_id
    )
}

/// Path of the manifest list for a snapshot.
pub fn manifest_list_path(location: &str, snapshot_id: &SnapshotId) -> String {
    format!(
        "{}/metadata/snap-{}.avro",
        location.trim_end_matches('/'),
        snapshot_id
    )
}

/// Rows to delete.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    /// Explicit id values, used verbatim
    Ids(Vec<String>),
    /// Rows matching all filters
    Filters(Vec<QueryFilter>),
}

/// Caller request to delete rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub filters: Vec<QueryFilter>,
    #[serde(default)]
    pub ids: Vec<String>,
    /// Must be `true`
    #[serde(default)]
    pub confirm: bool,
}

impl DeleteRequest {
    /// Check the request and pick its target. Ids win over filters.
    pub fn validate(&self) -> Result<DeleteTarget> {
        if !self.confirm {
            return Err(ValidationError::NotConfirmed.into());
        }
        if !self.ids.is_empty() {
            Ok(DeleteTarget::Ids(self.ids.clone()))
        } else if !self.filters.is_empty() {
            Ok(DeleteTarget::Filters(self.filters.clone()))
        } else {
            Err(ValidationError::EmptyDelete.into())
        }
    }
}

/// Caller request to read rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub filters: Vec<QueryFilter>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// A committed (or no-op) delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteResult {
    /// Rows covered by the delete file
    pub deleted_count: usize,
    /// New snapshot, `None` when nothing matched
    pub snapshot_id: Option<SnapshotId>,
    /// Attempts used, first try included
    pub attempts: u32,
}

/// Flattened result for callers that report rather than propagate errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub success: bool,
    pub deleted_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteOutcome {
    /// Outcome of a delete that finished.
    pub fn succeeded(deleted_count: usize) -> Self {
        Self {
            success: true,
            deleted_count,
            error: None,
        }
    }

    /// Outcome of a delete that failed.
    pub fn failed(error: &Error) -> Self {
        Self {
            success: false,
            deleted_count: 0,
            error: Some(error.to_string()),
        }
    }
}

impl From<Result<DeleteResult>> for DeleteOutcome {
    fn from(result: Result<DeleteResult>) -> Self {
        match result {
            Ok(r) => Self::succeeded(r.deleted_count),
            Err(e) => Self::failed(&e),
        }
    }
}

/// Counters across all deletes run by one orchestrator.
#[derive(Debug, Default)]
pub struct DeleteStats {
    /// Attempts started
    pub attempts: AtomicU64,
    /// Attempts ending in a commit conflict
    pub conflicts: AtomicU64,
    /// Deletes that finished successfully, no-ops included
    pub deletes_succeeded: AtomicU64,
    /// Deletes that ended in an error
    pub deletes_failed: AtomicU64,
    /// Rows covered by committed delete files
    pub rows_deleted: AtomicU64,
}

impl DeleteStats {
    /// Fraction of finished deletes that succeeded.
    pub fn success_rate(&self) -> f64 {
        let succeeded = self.deletes_succeeded.load(Ordering::Relaxed);
        let failed = self.deletes_failed.load(Ordering::Relaxed);
        if succeeded + failed == 0 {
            1.0
        } else {
            succeeded as f64 / (succeeded + failed) as f64
        }
    }
}

/// Runs equality deletes against catalog-managed tables.
pub struct DeleteOrchestrator {
    catalog: Arc<dyn TableCatalog>,
    query_engine: Arc<dyn QueryEngine>,
    object_store: Arc<dyn ObjectStore>,
    writer: Arc<dyn DeleteFileWriter>,
    compiler: PredicateCompiler,
    config: DeleteConfig,
    stats: DeleteStats,
}

impl DeleteOrchestrator {
    /// Create a builder.
    pub fn builder() -> DeleteOrchestratorBuilder {
        DeleteOrchestratorBuilder::new()
    }

    /// Wire up the REST catalog, HTTP query engine and object store from configuration.
    pub async fn connect(config: &Config) -> Result<Self> {
        let catalog = RestCatalogClient::connect(&config.catalog).await?;
        let query_engine = HttpQueryEngine::new(&config.query_engine)?;
        let object_store = create_object_store(&config.storage)?;

        DeleteOrchestrator::builder()
            .catalog(Arc::new(catalog))
            .query_engine(Arc::new(query_engine))
            .object_store(object_store)
            .registry(TableRegistry::with_overrides(&config.tables))
            .config(config.delete.clone())
            .build()
    }

    /// Statistics.
    pub fn stats(&self) -> &DeleteStats {
        &self.stats
    }

    /// Table allow-lists in use.
    pub fn registry(&self) -> &TableRegistry {
        self.compiler.registry()
    }

    /// Validate a request and run it, reporting the result as a flat outcome.
    pub async fn delete(&self, table: &str, request: &DeleteRequest) -> DeleteOutcome {
        let result = match request.validate() {
            Ok(target) => self.execute_equality_delete(table, &target).await,
            Err(e) => Err(e),
        };
        DeleteOutcome::from(result)
    }

    /// Run a delete, retrying from fresh metadata on commit conflicts.
    pub async fn execute_equality_delete(
        &self,
        table: &str,
        target: &DeleteTarget,
    ) -> Result<DeleteResult> {
        if let Err(e) = self.precheck(table, target) {
            self.stats.deletes_failed.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        let max_attempts = self.config.max_attempts;
        for attempt in 1..=max_attempts {
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);

            match self.execute_delete_attempt(table, target).await {
                Ok(mut result) => {
                    result.attempts = attempt;
                    self.stats.deletes_succeeded.fetch_add(1, Ordering::Relaxed);
                    self.stats
                        .rows_deleted
                        .fetch_add(result.deleted_count as u64, Ordering::Relaxed);

                    if attempt > 1 {
                        info!(table = %table, attempt, "Delete succeeded after conflicts");
                    }
                    return Ok(result);
                }
                Err(e) if e.is_retryable() => {
                    self.stats.conflicts.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        table = %table,
                        attempt,
                        max_attempts,
                        "Commit conflict, restarting from fresh metadata"
                    );
                }
                Err(e) => {
                    self.stats.deletes_failed.fetch_add(1, Ordering::Relaxed);
                    error!(table = %table, attempt, error = %e, "Delete failed");
                    return Err(e);
                }
            }
        }

        self.stats.deletes_failed.fetch_add(1, Ordering::Relaxed);
        error!(table = %table, attempts = max_attempts, "Delete gave up after repeated conflicts");
        Err(Error::MaxRetriesExceeded {
            attempts: max_attempts,
        })
    }

    /// Reject bad input before any I/O.
    fn precheck(&self, table: &str, target: &DeleteTarget) -> Result<()> {
        self.compiler.registry().ensure_table(table)?;
        if let DeleteTarget::Filters(filters) = target {
            self.compiler.build_where_clause(table, filters)?;
        }
        Ok(())
    }

    /// One delete attempt. A commit conflict surfaces as [`Error::Conflict`].
    pub async fn execute_delete_attempt(
        &self,
        table: &str,
        target: &DeleteTarget,
    ) -> Result<DeleteResult> {
        self.compiler.registry().ensure_table(table)?;
        let table_id = TableIdentifier::new(&self.config.namespace, table);

        let metadata = self.catalog.load_table(&table_id).await?.metadata;
        if let Some(current) = metadata.current_snapshot_id() {
            // The new manifest list carries the current snapshot's manifests forward
            if metadata.current_snapshot().is_none() {
                return Err(CatalogError::InvalidResponse(format!(
                    "current snapshot {} is not in the table's snapshot list",
                    current
                ))
                .into());
            }
        }

        let ids = self.resolve_ids(table, target).await?;
        if ids.is_empty() {
            info!(table = %table_id, "No rows matched, nothing to delete");
            return Ok(DeleteResult {
                deleted_count: 0,
                snapshot_id: None,
                attempts: 1,
            });
        }
        if ids.len() > self.config.max_delete_rows {
            return Err(Error::ResourceLimit {
                count: ids.len(),
                limit: self.config.max_delete_rows,
            });
        }

        let delete_file = {
            let mut session = self.writer.open().await?;
            session
                .write_equality_deletes(&self.config.id_column, self.config.id_field_id, &ids)
                .await?
        };

        let parent_snapshot_id = metadata.current_snapshot_id().cloned();
        let sequence_number = metadata.last_sequence_number + 1;
        let snapshot_id = generate_snapshot_id();
        let location = metadata.location.as_str();

        debug!(
            table = %table_id,
            snapshot_id = %snapshot_id,
            parent_snapshot_id = ?parent_snapshot_id,
            sequence_number,
            rows = ids.len(),
            "Writing delete snapshot"
        );

        let delete_path = delete_file_path(location, &snapshot_id);
        let delete_file_size = delete_file.bytes.len();
        put_file(self.object_store.as_ref(), &delete_path, delete_file.bytes).await?;

        let entry = build_delete_manifest_entry(DeleteManifestEntryArgs {
            snapshot_id: &snapshot_id,
            sequence_number,
            file_path: delete_path,
            record_count: delete_file.record_count as i64,
            file_size_in_bytes: delete_file_size as i64,
            equality_field_id: self.config.id_field_id,
        });
        let manifest = manifest_path(location, &snapshot_id);
        let manifest_bytes = encode_manifest(&[entry])?;
        let manifest_length = manifest_bytes.len() as i64;
        put_file(
            self.object_store.as_ref(),
            &manifest,
            Bytes::from(manifest_bytes),
        )
        .await?;

        let mut manifests = self.load_manifest_list(&metadata).await?;
        manifests.push(ManifestListEntry {
            manifest_path: manifest,
            manifest_length,
            partition_spec_id: metadata.default_spec_id,
            content: MANIFEST_CONTENT_DELETES,
            sequence_number,
            min_sequence_number: sequence_number,
            added_snapshot_id: snapshot_id.as_i64(),
            added_data_files_count: 0,
            existing_data_files_count: 0,
            deleted_data_files_count: 1,
            added_rows_count: 0,
            existing_rows_count: 0,
            deleted_rows_count: ids.len() as i64,
        });
        let manifest_list = manifest_list_path(location, &snapshot_id);
        put_file(
            self.object_store.as_ref(),
            &manifest_list,
            Bytes::from(encode_manifest_list(&manifests)?),
        )
        .await?;

        let snapshot = build_delete_snapshot(DeleteSnapshotArgs {
            snapshot_id: snapshot_id.clone(),
            parent_snapshot_id: parent_snapshot_id.clone(),
            sequence_number,
            manifest_list,
            schema_id: metadata.current_schema_id,
            deleted_records: ids.len(),
        });

        let request = CommitTableRequest {
            requirements: vec![TableRequirement::AssertRefSnapshotId {
                ref_name: MAIN_BRANCH.to_string(),
                snapshot_id: parent_snapshot_id.unwrap_or_else(SnapshotId::none),
            }],
            updates: vec![
                TableUpdate::AddSnapshot { snapshot },
                TableUpdate::SetSnapshotRef {
                    ref_name: MAIN_BRANCH.to_string(),
                    ref_type: "branch".to_string(),
                    snapshot_id: snapshot_id.clone(),
                },
            ],
        };

        match self.catalog.commit_table(&table_id, &request).await? {
            CommitOutcome::Committed => {
                info!(
                    table = %table_id,
                    snapshot_id = %snapshot_id,
                    deleted = ids.len(),
                    "Equality delete committed"
                );
                Ok(DeleteResult {
                    deleted_count: ids.len(),
                    snapshot_id: Some(snapshot_id),
                    attempts: 1,
                })
            }
            CommitOutcome::Conflict => Err(Error::Conflict),
        }
    }

    /// Run an ad-hoc query against an allow-listed table.
    pub async fn query(&self, table: &str, request: &QueryRequest) -> Result<Vec<Row>> {
        let sql = self.compiler.build_select_query(&SelectQueryArgs {
            table,
            namespace: &self.config.namespace,
            filters: &request.filters,
            columns: &request.columns,
            limit: request.limit,
        })?;
        self.query_engine.execute(&sql).await
    }

    async fn resolve_ids(&self, table: &str, target: &DeleteTarget) -> Result<Vec<String>> {
        let filters = match target {
            DeleteTarget::Ids(ids) => return Ok(ids.clone()),
            DeleteTarget::Filters(filters) => filters,
        };

        // One past the ceiling so the row limit check can trip
        let limit = self.config.max_delete_rows as i64 + 1;
        let sql = self.compiler.build_id_query(
            table,
            &self.config.namespace,
            filters,
            &self.config.id_column,
            limit,
        )?;

        let rows = self.query_engine.execute(&sql).await?;
        rows.iter()
            .map(|row| id_value(row, &self.config.id_column))
            .collect()
    }

    /// Entries of the current snapshot's manifest list, empty for a table without one.
    async fn load_manifest_list(&self, metadata: &TableMetadata) -> Result<Vec<ManifestListEntry>> {
        let Some(current) = metadata.current_snapshot() else {
            return Ok(Vec::new());
        };

        match get_file(self.object_store.as_ref(), &current.manifest_list).await? {
            Some(bytes) => decode_manifest_list(&bytes),
            None => {
                warn!(
                    manifest_list = %current.manifest_list,
                    "Current manifest list not found, starting a new one"
                );
                Ok(Vec::new())
            }
        }
    }
}

fn id_value(row: &Row, column: &str) -> Result<String> {
    match row.get(column) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(value @ (Value::Number(_) | Value::Bool(_))) => Ok(value.to_string()),
        _ => Err(Error::Serialization(format!(
            "Query row has no usable {} value",
            column
        ))),
    }
}

/// Builder for [`DeleteOrchestrator`].
pub struct DeleteOrchestratorBuilder {
    catalog: Option<Arc<dyn TableCatalog>>,
    query_engine: Option<Arc<dyn QueryEngine>>,
    object_store: Option<Arc<dyn ObjectStore>>,
    writer: Option<Arc<dyn DeleteFileWriter>>,
    registry: TableRegistry,
    config: Option<DeleteConfig>,
}

impl DeleteOrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            catalog: None,
            query_engine: None,
            object_store: None,
            writer: None,
            registry: TableRegistry::builtin(),
            config: None,
        }
    }

    /// Set the catalog.
    pub fn catalog(mut self, catalog: Arc<dyn TableCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the query engine.
    pub fn query_engine(mut self, query_engine: Arc<dyn QueryEngine>) -> Self {
        self.query_engine = Some(query_engine);
        self
    }

    /// Set the object store.
    pub fn object_store(mut self, object_store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(object_store);
        self
    }

    /// Set the delete file writer. Defaults to Parquet.
    pub fn delete_file_writer(mut self, writer: Arc<dyn DeleteFileWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Set the table registry. Defaults to the built-in tables.
    pub fn registry(mut self, registry: TableRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the delete configuration.
    pub fn config(mut self, config: DeleteConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the DeleteOrchestrator.
    pub fn build(self) -> Result<DeleteOrchestrator> {
        let catalog = self
            .catalog
            .ok_or_else(|| Error::Config("DeleteOrchestrator requires a catalog".to_string()))?;
        let query_engine = self.query_engine.ok_or_else(|| {
            Error::Config("DeleteOrchestrator requires a query engine".to_string())
        })?;
        let object_store = self.object_store.ok_or_else(|| {
            Error::Config("DeleteOrchestrator requires an object store".to_string())
        })?;
        let config = self.config.ok_or_else(|| {
            Error::Config("DeleteOrchestrator requires a delete configuration".to_string())
        })?;
        if config.max_attempts == 0 {
            return Err(Error::Config(
                "max_attempts must be greater than zero".to_string(),
            ));
        }
        let writer = self
            .writer
            .unwrap_or_else(|| Arc::new(ParquetDeleteFileWriter::new()));

        Ok(DeleteOrchestrator {
            catalog,
            query_engine,
            object_store,
            writer,
            compiler: PredicateCompiler::new(self.registry),
            config,
            stats: DeleteStats::default(),
        })
    }
}

impl Default for DeleteOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{LoadTableResponse, Snapshot, SnapshotSummary};
    use crate::iceberg::manifest::{decode_manifest, CONTENT_EQUALITY_DELETES};
    use crate::iceberg::manifest_list::MANIFEST_CONTENT_DATA;
    use async_trait::async_trait;
    use futures::TryStreamExt;
    use object_store::memory::InMemory;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::AtomicU32;

    const LOCATION: &str = "s3://bucket/warehouse/horse_racing/horse_info";
    const PARENT_MANIFEST_LIST: &str =
        "s3://bucket/warehouse/horse_racing/horse_info/metadata/snap-100.avro";

    enum CommitBehavior {
        /// Conflict this many times, then accept
        ConflictTimes(u32),
        /// Always fail with this status
        Fail(u16),
    }

    /// Catalog that keeps metadata in memory and applies accepted commits.
    struct MockCatalog {
        metadata: Mutex<TableMetadata>,
        behavior: CommitBehavior,
        conflicts: AtomicU32,
        loads: AtomicU32,
        commits: Mutex<Vec<CommitTableRequest>>,
    }

    impl MockCatalog {
        fn new(metadata: TableMetadata, behavior: CommitBehavior) -> Self {
            Self {
                metadata: Mutex::new(metadata),
                behavior,
                conflicts: AtomicU32::new(0),
                loads: AtomicU32::new(0),
                commits: Mutex::new(Vec::new()),
            }
        }

        fn loads(&self) -> u32 {
            self.loads.load(Ordering::SeqCst)
        }

        fn commits(&self) -> Vec<CommitTableRequest> {
            self.commits.lock().clone()
        }
    }

    #[async_trait]
    impl TableCatalog for MockCatalog {
        async fn load_table(&self, _id: &TableIdentifier) -> Result<LoadTableResponse> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(LoadTableResponse {
                metadata_location: None,
                metadata: self.metadata.lock().clone(),
                config: HashMap::new(),
            })
        }

        async fn commit_table(
            &self,
            id: &TableIdentifier,
            request: &CommitTableRequest,
        ) -> Result<CommitOutcome> {
            self.commits.lock().push(request.clone());

            match self.behavior {
                CommitBehavior::Fail(status) => {
                    return Err(CatalogError::Status {
                        operation: format!("Commit to {}", id),
                        status,
                        body: "Conflict detector unavailable".to_string(),
                    }
                    .into());
                }
                CommitBehavior::ConflictTimes(n) => {
                    if self.conflicts.fetch_add(1, Ordering::SeqCst) < n {
                        return Ok(CommitOutcome::Conflict);
                    }
                }
            }

            let mut metadata = self.metadata.lock();
            for update in &request.updates {
                match update {
                    TableUpdate::AddSnapshot { snapshot } => {
                        metadata.last_sequence_number = snapshot.sequence_number;
                        metadata.snapshots.push(snapshot.clone());
                    }
                    TableUpdate::SetSnapshotRef { snapshot_id, .. } => {
                        metadata.current_snapshot_id = Some(snapshot_id.clone());
                    }
                }
            }
            Ok(CommitOutcome::Committed)
        }
    }

    /// Query engine returning fixed rows and recording the SQL it saw.
    struct MockQueryEngine {
        rows: Vec<Row>,
        queries: Mutex<Vec<String>>,
    }

    impl MockQueryEngine {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                rows,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QueryEngine for MockQueryEngine {
        async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
            self.queries.lock().push(sql.to_string());
            Ok(self.rows.clone())
        }
    }

    fn row(id: Value) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), id);
        row
    }

    fn empty_metadata() -> TableMetadata {
        serde_json::from_value(serde_json::json!({
            "format-version": 2,
            "table-uuid": "uuid",
            "location": LOCATION,
            "last-sequence-number": 0,
            "last-column-id": 3,
            "current-schema-id": 0,
            "default-spec-id": 0
        }))
        .unwrap()
    }

    fn metadata_with_snapshot() -> TableMetadata {
        let mut metadata = empty_metadata();
        metadata.last_sequence_number = 1;
        metadata.current_snapshot_id = Some(SnapshotId::from(100));
        metadata.snapshots.push(Snapshot {
            snapshot_id: SnapshotId::from(100),
            parent_snapshot_id: None,
            sequence_number: 1,
            timestamp_ms: 1_700_000_000_000,
            summary: SnapshotSummary {
                operation: "append".to_string(),
                properties: BTreeMap::new(),
            },
            manifest_list: PARENT_MANIFEST_LIST.to_string(),
            schema_id: Some(0),
        });
        metadata
    }

    async fn seeded_store() -> Arc<InMemory> {
        let store = Arc::new(InMemory::new());
        let data_manifest = ManifestListEntry {
            manifest_path: format!("{}/metadata/manifest-100.avro", LOCATION),
            manifest_length: 1024,
            partition_spec_id: 0,
            content: MANIFEST_CONTENT_DATA,
            sequence_number: 1,
            min_sequence_number: 1,
            added_snapshot_id: 100,
            added_data_files_count: 1,
            existing_data_files_count: 0,
            deleted_data_files_count: 0,
            added_rows_count: 10,
            existing_rows_count: 0,
            deleted_rows_count: 0,
        };
        put_file(
            store.as_ref(),
            PARENT_MANIFEST_LIST,
            Bytes::from(encode_manifest_list(&[data_manifest]).unwrap()),
        )
        .await
        .unwrap();
        store
    }

    async fn object_count(store: &InMemory) -> usize {
        let objects: Vec<_> = store.list(None).try_collect().await.unwrap();
        objects.len()
    }

    struct Harness {
        orchestrator: DeleteOrchestrator,
        catalog: Arc<MockCatalog>,
        engine: Arc<MockQueryEngine>,
        store: Arc<InMemory>,
        writer: Arc<ParquetDeleteFileWriter>,
    }

    async fn harness(metadata: TableMetadata, behavior: CommitBehavior, rows: Vec<Row>) -> Harness {
        let catalog = Arc::new(MockCatalog::new(metadata, behavior));
        let engine = Arc::new(MockQueryEngine::new(rows));
        let store = seeded_store().await;
        let writer = Arc::new(ParquetDeleteFileWriter::new());

        let orchestrator = DeleteOrchestrator::builder()
            .catalog(catalog.clone())
            .query_engine(engine.clone())
            .object_store(store.clone())
            .delete_file_writer(writer.clone())
            .config(DeleteConfig::for_namespace("horse_racing"))
            .build()
            .unwrap();

        Harness {
            orchestrator,
            catalog,
            engine,
            store,
            writer,
        }
    }

    fn ids(values: &[&str]) -> DeleteTarget {
        DeleteTarget::Ids(values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_paths() {
        let sid = SnapshotId::from(7);
        assert_eq!(
            delete_file_path("s3://b/t/", &sid),
            "s3://b/t/data/equality-delete-7.parquet"
        );
        assert_eq!(manifest_path("s3://b/t", &sid), "s3://b/t/metadata/manifest-7.avro");
        assert_eq!(manifest_list_path("s3://b/t", &sid), "s3://b/t/metadata/snap-7.avro");
    }

    #[test]
    fn test_delete_request_validation() {
        let request = DeleteRequest {
            ids: vec!["a".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            request.validate(),
            Err(Error::Validation(ValidationError::NotConfirmed))
        ));

        let request = DeleteRequest {
            confirm: true,
            ..Default::default()
        };
        assert!(matches!(
            request.validate(),
            Err(Error::Validation(ValidationError::EmptyDelete))
        ));

        let request: DeleteRequest = serde_json::from_str(
            r#"{"confirm": true, "ids": ["a"], "filters": [{"column": "id", "op": "eq", "value": "b"}]}"#,
        )
        .unwrap();
        assert_eq!(request.validate().unwrap(), ids(&["a"]));
    }

    #[tokio::test]
    async fn test_delete_explicit_ids_extends_manifest_list() {
        let h = harness(metadata_with_snapshot(), CommitBehavior::ConflictTimes(0), vec![]).await;

        let result = h
            .orchestrator
            .execute_equality_delete("horse_info", &ids(&["id-001", "id-002", "id-003"]))
            .await
            .unwrap();
        assert_eq!(result.deleted_count, 3);
        assert_eq!(result.attempts, 1);
        let new_id = result.snapshot_id.unwrap();

        // Ids were used verbatim
        assert!(h.engine.queries.lock().is_empty());

        let commits = h.catalog.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(
            commits[0].requirements,
            vec![TableRequirement::AssertRefSnapshotId {
                ref_name: "main".to_string(),
                snapshot_id: SnapshotId::from(100),
            }]
        );

        let snapshot = match &commits[0].updates[0] {
            TableUpdate::AddSnapshot { snapshot } => snapshot.clone(),
            other => panic!("unexpected update {other:?}"),
        };
        assert_eq!(snapshot.snapshot_id, new_id);
        assert_eq!(snapshot.sequence_number, 2);
        assert_eq!(snapshot.parent_snapshot_id, Some(SnapshotId::from(100)));
        assert_eq!(snapshot.summary.operation, "delete");
        assert_eq!(snapshot.summary.properties["deleted-records"], "3");
        assert_eq!(
            commits[0].updates[1],
            TableUpdate::SetSnapshotRef {
                ref_name: "main".to_string(),
                ref_type: "branch".to_string(),
                snapshot_id: new_id.clone(),
            }
        );

        // Manifest list: parent's entry plus one delete manifest
        let list = get_file(h.store.as_ref(), &snapshot.manifest_list)
            .await
            .unwrap()
            .unwrap();
        let entries = decode_manifest_list(&list).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].added_snapshot_id, 100);
        let delete_entry = &entries[1];
        assert_eq!(delete_entry.content, MANIFEST_CONTENT_DELETES);
        assert_eq!(delete_entry.sequence_number, 2);
        assert_eq!(delete_entry.min_sequence_number, 2);
        assert_eq!(delete_entry.deleted_rows_count, 3);
        assert_eq!(delete_entry.deleted_data_files_count, 1);
        assert_eq!(delete_entry.added_snapshot_id, new_id.as_i64());

        let manifest = get_file(h.store.as_ref(), &delete_entry.manifest_path)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delete_entry.manifest_length, manifest.len() as i64);
        let manifest_entries = decode_manifest(&manifest).unwrap();
        assert_eq!(manifest_entries.len(), 1);
        let data_file = &manifest_entries[0].data_file;
        assert_eq!(data_file.content, CONTENT_EQUALITY_DELETES);
        assert_eq!(data_file.record_count, 3);
        assert_eq!(data_file.equality_ids, Some(vec![2]));
        assert_eq!(data_file.file_path, delete_file_path(LOCATION, &new_id));

        let delete_file = get_file(h.store.as_ref(), &data_file.file_path)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data_file.file_size_in_bytes, delete_file.len() as i64);

        assert_eq!(h.writer.open_sessions(), 0);
        let stats = h.orchestrator.stats();
        assert_eq!(stats.rows_deleted.load(Ordering::Relaxed), 3);
        assert_eq!(stats.deletes_succeeded.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_first_delete_on_empty_table_asserts_sentinel() {
        let h = harness(empty_metadata(), CommitBehavior::ConflictTimes(0), vec![]).await;

        h.orchestrator
            .execute_equality_delete("horse_info", &ids(&["x"]))
            .await
            .unwrap();

        let commits = h.catalog.commits();
        assert_eq!(
            commits[0].requirements[0],
            TableRequirement::AssertRefSnapshotId {
                ref_name: "main".to_string(),
                snapshot_id: SnapshotId::none(),
            }
        );
        let TableUpdate::AddSnapshot { snapshot } = &commits[0].updates[0] else {
            panic!("first update must add the snapshot");
        };
        assert!(snapshot.parent_snapshot_id.is_none());
        assert_eq!(snapshot.sequence_number, 1);

        let list = get_file(h.store.as_ref(), &snapshot.manifest_list)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decode_manifest_list(&list).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dangling_current_snapshot_rejected_before_writes() {
        // The catalog points main at a snapshot it does not list
        let mut metadata = metadata_with_snapshot();
        metadata.current_snapshot_id = Some(SnapshotId::from(200));
        let h = harness(metadata, CommitBehavior::ConflictTimes(0), vec![]).await;
        let objects_before = object_count(&h.store).await;

        let err = h
            .orchestrator
            .execute_equality_delete("horse_info", &ids(&["a", "b"]))
            .await
            .unwrap_err();

        match err {
            Error::Catalog(CatalogError::InvalidResponse(message)) => {
                assert!(message.contains("200"), "{message}")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.catalog.loads(), 1);
        assert!(h.catalog.commits().is_empty());
        assert_eq!(object_count(&h.store).await, objects_before);
        assert_eq!(h.writer.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_filters_resolve_ids_through_query_engine() {
        let rows = vec![row(Value::from("a")), row(Value::from(5))];
        let h = harness(metadata_with_snapshot(), CommitBehavior::ConflictTimes(0), rows).await;

        let filters = vec![QueryFilter::new("horse_name", "eq", "O'Neil".into())];
        let result = h
            .orchestrator
            .execute_equality_delete("horse_info", &DeleteTarget::Filters(filters))
            .await
            .unwrap();
        assert_eq!(result.deleted_count, 2);

        assert_eq!(
            h.engine.queries.lock().as_slice(),
            ["SELECT id FROM horse_racing.horse_info WHERE horse_name = 'O''Neil' LIMIT 50001"]
        );
    }

    #[tokio::test]
    async fn test_zero_matches_writes_nothing() {
        let h = harness(metadata_with_snapshot(), CommitBehavior::ConflictTimes(0), vec![]).await;
        let before = object_count(&h.store).await;

        let filters = vec![QueryFilter::new("horse_name", "eq", "nobody".into())];
        let result = h
            .orchestrator
            .execute_equality_delete("horse_info", &DeleteTarget::Filters(filters))
            .await
            .unwrap();

        assert_eq!(result.deleted_count, 0);
        assert!(result.snapshot_id.is_none());
        assert_eq!(object_count(&h.store).await, before);
        assert!(h.catalog.commits().is_empty());
    }

    #[tokio::test]
    async fn test_over_limit_fails_before_writes() {
        let h = harness(metadata_with_snapshot(), CommitBehavior::ConflictTimes(0), vec![]).await;
        let before = object_count(&h.store).await;

        let many: Vec<String> = (0..50_001).map(|i| format!("id-{i}")).collect();
        let err = h
            .orchestrator
            .execute_equality_delete("horse_info", &DeleteTarget::Ids(many))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::ResourceLimit {
                count: 50_001,
                limit: 50_000
            }
        ));
        assert_eq!(object_count(&h.store).await, before);
        assert!(h.catalog.commits().is_empty());
        assert_eq!(h.writer.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_conflicts_then_success() {
        let h = harness(metadata_with_snapshot(), CommitBehavior::ConflictTimes(2), vec![]).await;

        let result = h
            .orchestrator
            .execute_equality_delete("horse_info", &ids(&["a", "b"]))
            .await
            .unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(result.deleted_count, 2);
        assert_eq!(h.catalog.loads(), 3);

        // Every attempt generated its own snapshot
        let commits = h.catalog.commits();
        assert_eq!(commits.len(), 3);
        let snapshot_ids: Vec<SnapshotId> = commits
            .iter()
            .map(|c| match &c.updates[1] {
                TableUpdate::SetSnapshotRef { snapshot_id, .. } => snapshot_id.clone(),
                other => panic!("unexpected update {other:?}"),
            })
            .collect();
        let distinct: std::collections::HashSet<_> = snapshot_ids.iter().collect();
        assert_eq!(distinct.len(), 3);
        assert_eq!(result.snapshot_id.as_ref(), Some(&snapshot_ids[2]));

        let stats = h.orchestrator.stats();
        assert_eq!(stats.attempts.load(Ordering::Relaxed), 3);
        assert_eq!(stats.conflicts.load(Ordering::Relaxed), 2);
        assert_eq!(h.writer.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_always_conflicting_gives_up_after_three_attempts() {
        let h = harness(metadata_with_snapshot(), CommitBehavior::ConflictTimes(u32::MAX), vec![]).await;

        let err = h
            .orchestrator
            .execute_equality_delete("horse_info", &ids(&["a"]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MaxRetriesExceeded { attempts: 3 }));
        assert!(!err.is_retryable());
        assert_eq!(h.catalog.loads(), 3);
        assert_eq!(h.catalog.commits().len(), 3);
        assert_eq!(h.orchestrator.stats().deletes_failed.load(Ordering::Relaxed), 1);
        assert_eq!(h.writer.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_is_not_retried() {
        let h = harness(metadata_with_snapshot(), CommitBehavior::Fail(500), vec![]).await;

        let err = h
            .orchestrator
            .execute_equality_delete("horse_info", &ids(&["a"]))
            .await
            .unwrap_err();

        match err {
            Error::Catalog(e) => assert_eq!(e.status(), Some(500)),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.catalog.commits().len(), 1);
        assert_eq!(h.catalog.loads(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_io() {
        let h = harness(metadata_with_snapshot(), CommitBehavior::ConflictTimes(0), vec![]).await;

        let err = h
            .orchestrator
            .execute_equality_delete("users", &ids(&["a"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidTable(_))
        ));

        let filters = vec![QueryFilter::new("password", "eq", "x".into())];
        let err = h
            .orchestrator
            .execute_equality_delete("horse_info", &DeleteTarget::Filters(filters))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidColumn(_))
        ));

        assert_eq!(h.catalog.loads(), 0);
        assert!(h.engine.queries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_delete_outcome() {
        let h = harness(metadata_with_snapshot(), CommitBehavior::ConflictTimes(0), vec![]).await;

        let outcome = h
            .orchestrator
            .delete(
                "horse_info",
                &DeleteRequest {
                    ids: vec!["a".to_string()],
                    confirm: true,
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"success": true, "deletedCount": 1})
        );

        let outcome = h
            .orchestrator
            .delete("horse_info", &DeleteRequest::default())
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Validation error: Delete requires confirm: true"));
    }

    #[tokio::test]
    async fn test_query() {
        let rows = vec![row(Value::from("a"))];
        let h = harness(metadata_with_snapshot(), CommitBehavior::ConflictTimes(0), rows).await;

        let result = h
            .orchestrator
            .query(
                "horse_info",
                &QueryRequest {
                    filters: vec![QueryFilter::new("id", "eq", "a".into())],
                    columns: vec!["id".to_string()],
                    limit: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(
            h.engine.queries.lock().as_slice(),
            ["SELECT id FROM horse_racing.horse_info WHERE id = 'a' LIMIT 100"]
        );
    }

    #[test]
    fn test_id_value() {
        assert_eq!(id_value(&row(Value::from("x")), "id").unwrap(), "x");
        assert_eq!(id_value(&row(Value::from(42)), "id").unwrap(), "42");
        assert!(id_value(&row(Value::Null), "id").is_err());
        assert!(id_value(&Row::new(), "id").is_err());
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = DeleteOrchestrator::builder().build().err().unwrap();
        assert!(err.to_string().contains("catalog"));
    }

    #[test]
    fn test_success_rate() {
        let stats = DeleteStats::default();
        assert_eq!(stats.success_rate(), 1.0);
        stats.deletes_succeeded.fetch_add(3, Ordering::Relaxed);
        stats.deletes_failed.fetch_add(1, Ordering::Relaxed);
        assert_eq!(stats.success_rate(), 0.75);
    }
}
