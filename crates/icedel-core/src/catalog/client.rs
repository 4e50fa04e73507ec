//! REST catalog client.
//!
//! Loads table metadata and commits new snapshots with compare-and-swap
//! semantics: the catalog applies a commit only if every requirement still
//! holds, and answers `409 Conflict` otherwise.

use crate::catalog::rest_api::{CatalogConfigResponse, CommitTableRequest, LoadTableResponse};
use crate::catalog::snapshot_ids::{numberify_value, stringify_snapshot_ids};
use crate::config::CatalogConfig;
use crate::{CatalogError, Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Namespace and table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentifier {
    /// Namespace
    pub namespace: String,
    /// Table name
    pub table: String,
}

impl TableIdentifier {
    /// Create a new table identifier.
    pub fn new(namespace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.table)
    }
}

/// Outcome of a commit the catalog answered.
///
/// Failures other than a conflict are returned as [`CatalogError::Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Commit applied
    Committed,
    /// Requirements no longer hold; another writer committed first
    Conflict,
}

/// Catalog operations used by the delete orchestrator.
#[async_trait]
pub trait TableCatalog: Send + Sync {
    /// Load fresh table metadata.
    async fn load_table(&self, id: &TableIdentifier) -> Result<LoadTableResponse>;

    /// Commit requirements and updates atomically.
    async fn commit_table(
        &self,
        id: &TableIdentifier,
        request: &CommitTableRequest,
    ) -> Result<CommitOutcome>;
}

/// Resolve the warehouse prefix the catalog expects in table URLs.
///
/// `GET {catalog_uri}/v1/config?warehouse={warehouse}` answers with
/// `overrides.prefix`, which may differ from the account/bucket identifier the
/// caller knows.
pub async fn fetch_catalog_prefix(
    client: &Client,
    catalog_uri: &str,
    warehouse: &str,
    token: &str,
) -> Result<String> {
    let url = config_url(catalog_uri, warehouse);
    let response = client
        .get(&url)
        .bearer_auth(token)
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(|e| CatalogError::Connection(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CatalogError::Connection(e.to_string()))?;

    if !status.is_success() {
        return Err(CatalogError::Status {
            operation: "Fetch catalog config".to_string(),
            status: status.as_u16(),
            body,
        }
        .into());
    }

    let config: CatalogConfigResponse = serde_json::from_str(&body)
        .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

    let prefix = config.prefix().ok_or_else(|| {
        CatalogError::InvalidResponse("catalog config has no overrides.prefix".to_string())
    })?;

    debug!(warehouse = %warehouse, prefix = %prefix, "Resolved catalog prefix");
    Ok(prefix.to_string())
}

fn config_url(catalog_uri: &str, warehouse: &str) -> String {
    format!(
        "{}/v1/config?warehouse={}",
        catalog_uri.trim_end_matches('/'),
        urlencoding::encode(warehouse)
    )
}

/// REST catalog client configuration.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// REST API base URI
    pub base_uri: String,
    /// Effective warehouse prefix used in table URLs
    pub warehouse: String,
    /// Bearer token
    pub token: String,
    /// Request timeout
    pub timeout: Duration,
}

/// REST catalog client implementation.
pub struct RestCatalogClient {
    /// HTTP client
    client: Client,
    /// Client configuration
    config: RestClientConfig,
}

impl RestCatalogClient {
    /// Create a client for an already-resolved warehouse prefix.
    pub fn new(config: RestClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: RestClientConfig {
                base_uri: config.base_uri.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    /// Create a client from configuration, resolving the warehouse prefix if enabled.
    pub async fn connect(config: &CatalogConfig) -> Result<Self> {
        let mut client = Self::new(RestClientConfig {
            base_uri: config.uri.clone(),
            warehouse: config.warehouse.clone(),
            token: config.token.clone(),
            timeout: Duration::from_secs(config.request_timeout_seconds),
        })?;

        if config.resolve_prefix {
            client.config.warehouse = fetch_catalog_prefix(
                &client.client,
                &client.config.base_uri,
                &config.warehouse,
                &config.token,
            )
            .await?;
        }

        info!(
            uri = %client.config.base_uri,
            warehouse = %client.config.warehouse,
            "REST catalog client initialized"
        );
        Ok(client)
    }

    /// Effective warehouse prefix.
    pub fn warehouse(&self) -> &str {
        &self.config.warehouse
    }

    /// URL of a table resource.
    pub fn table_url(&self, id: &TableIdentifier) -> String {
        format!(
            "{}/v1/{}/namespaces/{}/tables/{}",
            self.config.base_uri,
            urlencoding::encode(&self.config.warehouse),
            urlencoding::encode(&id.namespace),
            urlencoding::encode(&id.table)
        )
    }

    /// Build a request with authentication.
    fn build_request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.token)
            .header("Content-Type", "application/json")
    }

    /// Send a request and read the whole body.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Connection(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Connection(e.to_string()))?;
        Ok((status, body))
    }
}

#[async_trait]
impl TableCatalog for RestCatalogClient {
    async fn load_table(&self, id: &TableIdentifier) -> Result<LoadTableResponse> {
        let url = self.table_url(id);
        let (status, body) = self.send(self.build_request(Method::GET, &url)).await?;

        if !status.is_success() {
            return Err(CatalogError::Status {
                operation: format!("Load table {}", id),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let safe_body = stringify_snapshot_ids(&body)?;
        let response: LoadTableResponse = serde_json::from_str(&safe_body)
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

        debug!(
            table = %id,
            current_snapshot_id = ?response.metadata.current_snapshot_id(),
            last_sequence_number = response.metadata.last_sequence_number,
            "Loaded table metadata"
        );
        Ok(response)
    }

    async fn commit_table(
        &self,
        id: &TableIdentifier,
        request: &CommitTableRequest,
    ) -> Result<CommitOutcome> {
        let url = self.table_url(id);

        let mut body = serde_json::to_value(request)?;
        numberify_value(&mut body);

        let (status, text) = self
            .send(self.build_request(Method::POST, &url).body(body.to_string()))
            .await?;

        if status == StatusCode::CONFLICT {
            warn!(table = %id, "Commit rejected: table was modified concurrently");
            return Ok(CommitOutcome::Conflict);
        }

        if !status.is_success() {
            return Err(CatalogError::Status {
                operation: format!("Commit to {}", id),
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        info!(table = %id, "Commit accepted");
        Ok(CommitOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::rest_api::{TableRequirement, TableUpdate};
    use crate::catalog::snapshot_ids::SnapshotId;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::get;
    use axum::Router;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    const BIG_ID: &str = "9007199254740993";

    #[derive(Default)]
    struct Recorded {
        auth: Option<String>,
        content_type: Option<String>,
        commit_body: Option<String>,
    }

    struct ServerState {
        commit_status: u16,
        recorded: Mutex<Recorded>,
    }

    fn load_body() -> String {
        format!(
            r#"{{
                "metadata-location": "s3://bucket/table/metadata/v2.json",
                "metadata": {{
                    "format-version": 2,
                    "table-uuid": "uuid",
                    "location": "s3://bucket/table",
                    "last-sequence-number": 1,
                    "last-column-id": 3,
                    "current-schema-id": 0,
                    "current-snapshot-id": {BIG_ID},
                    "properties": {{"snapshot-id": "free-form"}},
                    "snapshots": [{{
                        "snapshot-id": {BIG_ID},
                        "sequence-number": 1,
                        "timestamp-ms": 1000,
                        "summary": {{"operation": "append"}},
                        "manifest-list": "s3://bucket/table/metadata/snap-1.avro",
                        "schema-id": 0
                    }}]
                }}
            }}"#
        )
    }

    async fn start_server(commit_status: u16) -> (String, Arc<ServerState>) {
        let state = Arc::new(ServerState {
            commit_status,
            recorded: Mutex::new(Recorded::default()),
        });

        async fn config(Query(params): Query<HashMap<String, String>>) -> (AxumStatus, String) {
            if params.get("warehouse").map(String::as_str) == Some("acct_bucket") {
                (
                    AxumStatus::OK,
                    r#"{"defaults":{},"overrides":{"prefix":"resolved-prefix"}}"#.to_string(),
                )
            } else {
                (AxumStatus::BAD_REQUEST, "unknown warehouse".to_string())
            }
        }

        async fn load(
            State(state): State<Arc<ServerState>>,
            headers: HeaderMap,
        ) -> (AxumStatus, String) {
            let mut recorded = state.recorded.lock();
            recorded.auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            recorded.content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            (AxumStatus::OK, load_body())
        }

        async fn commit(State(state): State<Arc<ServerState>>, body: String) -> (AxumStatus, String) {
            state.recorded.lock().commit_body = Some(body);
            let status = AxumStatus::from_u16(state.commit_status).unwrap();
            (status, "server says no".to_string())
        }

        let app = Router::new()
            .route("/v1/config", get(config))
            .route(
                "/v1/resolved-prefix/namespaces/horse_racing/tables/horse_info",
                get(load).post(commit),
            )
            .route(
                "/v1/resolved-prefix/namespaces/horse_racing/tables/missing",
                get(|| async { (AxumStatus::NOT_FOUND, "NoSuchTableException".to_string()) }),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), state)
    }

    async fn connect(uri: &str) -> RestCatalogClient {
        RestCatalogClient::connect(&CatalogConfig {
            uri: uri.to_string(),
            warehouse: "acct_bucket".to_string(),
            token: "test-token".to_string(),
            resolve_prefix: true,
            request_timeout_seconds: 5,
        })
        .await
        .unwrap()
    }

    fn commit_request() -> CommitTableRequest {
        CommitTableRequest {
            requirements: vec![TableRequirement::AssertRefSnapshotId {
                ref_name: "main".to_string(),
                snapshot_id: SnapshotId::parse(BIG_ID).unwrap(),
            }],
            updates: vec![TableUpdate::SetSnapshotRef {
                ref_name: "main".to_string(),
                ref_type: "branch".to_string(),
                snapshot_id: SnapshotId::from(i64::MAX),
            }],
        }
    }

    #[test]
    fn test_table_url() {
        let client = RestCatalogClient::new(RestClientConfig {
            base_uri: "https://catalog.example.com/".to_string(),
            warehouse: "prefix".to_string(),
            token: "t".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        assert_eq!(
            client.table_url(&TableIdentifier::new("horse_racing", "horse_info")),
            "https://catalog.example.com/v1/prefix/namespaces/horse_racing/tables/horse_info"
        );
    }

    #[test]
    fn test_config_url() {
        assert_eq!(
            config_url("https://catalog.example.com", "acct_bucket"),
            "https://catalog.example.com/v1/config?warehouse=acct_bucket"
        );
    }

    #[tokio::test]
    async fn test_connect_resolves_prefix() {
        let (uri, _state) = start_server(200).await;
        let client = connect(&uri).await;
        assert_eq!(client.warehouse(), "resolved-prefix");
    }

    #[tokio::test]
    async fn test_fetch_prefix_failure_carries_status() {
        let (uri, _state) = start_server(200).await;
        let err = fetch_catalog_prefix(&Client::new(), &uri, "other", "t")
            .await
            .unwrap_err();
        match err {
            Error::Catalog(e) => assert_eq!(e.status(), Some(400)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_load_table_preserves_large_snapshot_ids() {
        let (uri, state) = start_server(200).await;
        let client = connect(&uri).await;

        let response = client
            .load_table(&TableIdentifier::new("horse_racing", "horse_info"))
            .await
            .unwrap();

        let metadata = response.metadata;
        assert_eq!(metadata.current_snapshot_id().unwrap().as_str(), BIG_ID);
        assert_eq!(metadata.current_snapshot().unwrap().snapshot_id.as_str(), BIG_ID);
        assert_eq!(metadata.properties["snapshot-id"], "free-form");

        let recorded = state.recorded.lock();
        assert_eq!(recorded.auth.as_deref(), Some("Bearer test-token"));
        assert_eq!(recorded.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_load_table_not_found() {
        let (uri, _state) = start_server(200).await;
        let client = connect(&uri).await;

        let err = client
            .load_table(&TableIdentifier::new("horse_racing", "missing"))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("NoSuchTableException"));
    }

    #[tokio::test]
    async fn test_commit_sends_numeric_snapshot_ids() {
        let (uri, state) = start_server(200).await;
        let client = connect(&uri).await;

        let outcome = client
            .commit_table(
                &TableIdentifier::new("horse_racing", "horse_info"),
                &commit_request(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        let body = state.recorded.lock().commit_body.clone().unwrap();
        assert!(body.contains(&format!(r#""snapshot-id":{}"#, BIG_ID)));
        assert!(body.contains(&format!(r#""snapshot-id":{}"#, i64::MAX)));
        assert!(!body.contains(&format!(r#""{}""#, BIG_ID)));
    }

    #[tokio::test]
    async fn test_commit_conflict_is_structured() {
        let (uri, _state) = start_server(409).await;
        let client = connect(&uri).await;

        let outcome = client
            .commit_table(
                &TableIdentifier::new("horse_racing", "horse_info"),
                &commit_request(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_commit_failure_carries_status_and_body() {
        let (uri, _state) = start_server(500).await;
        let client = connect(&uri).await;

        let err = client
            .commit_table(
                &TableIdentifier::new("horse_racing", "horse_info"),
                &commit_request(),
            )
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("server says no"));
    }
}
