//! Query command implementation.

use super::parse_filter;
use anyhow::Result;
use icedel_core::{Config, DeleteOrchestrator, QueryRequest};

/// Run a read-only query and print the rows as JSON.
pub async fn run(
    config: Config,
    table: &str,
    filters: &[String],
    columns: Vec<String>,
    limit: Option<i64>,
) -> Result<()> {
    let request = QueryRequest {
        filters: filters
            .iter()
            .map(|f| parse_filter(f))
            .collect::<Result<Vec<_>>>()?,
        columns,
        limit,
    };

    let orchestrator = DeleteOrchestrator::connect(&config).await?;
    let rows = orchestrator.query(table, &request).await?;

    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
