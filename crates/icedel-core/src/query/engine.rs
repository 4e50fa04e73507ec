//! SQL query engine access.
//!
//! The engine is a remote SQL-over-HTTP service reading the same Iceberg
//! tables. It answers `{success, result: {rows}, errors: [{code, message}]}`.

use crate::config::QueryEngineConfig;
use crate::error::EngineMessage;
use crate::{Error, QueryEngineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// One result row, column name to value.
pub type Row = Map<String, Value>;

/// Executes SQL against the tables.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Run a query and return all rows.
    async fn execute(&self, sql: &str) -> Result<Vec<Row>>;
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    success: bool,
    #[serde(default)]
    result: Option<QueryResult>,
    #[serde(default)]
    errors: Vec<EngineMessage>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    rows: Vec<Row>,
}

/// HTTP query engine client.
pub struct HttpQueryEngine {
    client: Client,
    url: String,
    token: String,
}

impl HttpQueryEngine {
    /// Create a client from configuration.
    pub fn new(config: &QueryEngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: query_url(config),
            token: config.token.clone(),
        })
    }

    /// Query endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn query_url(config: &QueryEngineConfig) -> String {
    format!(
        "{}/{}/r2-sql/query/{}",
        config.endpoint.trim_end_matches('/'),
        config.account_id,
        config.bucket_name
    )
}

#[async_trait]
impl QueryEngine for HttpQueryEngine {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        debug!(sql = %sql, "Executing query");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&QueryBody { query: sql })
            .send()
            .await
            .map_err(|e| QueryEngineError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryEngineError::Request {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| QueryEngineError::Connection(e.to_string()))?;

        if !body.success {
            return Err(QueryEngineError::Engine(body.errors).into());
        }

        let rows = body.result.map(|r| r.rows).unwrap_or_default();
        debug!(rows = rows.len(), "Query returned");
        Ok(rows)
    }
}
