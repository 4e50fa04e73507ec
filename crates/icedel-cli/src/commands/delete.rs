//! Delete command implementation.

use super::parse_filter;
use anyhow::Result;
use icedel_core::{Config, DeleteOrchestrator, DeleteOutcome, DeleteRequest};
use std::sync::atomic::Ordering;
use tracing::info;

/// Delete rows by id or filter and print the outcome as JSON.
pub async fn run(
    config: Config,
    table: &str,
    ids: Vec<String>,
    filters: &[String],
    yes: bool,
) -> Result<()> {
    let request = DeleteRequest {
        filters: filters
            .iter()
            .map(|f| parse_filter(f))
            .collect::<Result<Vec<_>>>()?,
        ids,
        confirm: yes,
    };
    let target = request.validate()?;

    info!(
        table = %table,
        namespace = %config.delete.namespace,
        "Starting equality delete"
    );

    let orchestrator = DeleteOrchestrator::connect(&config).await?;
    let result = orchestrator.execute_equality_delete(table, &target).await;

    let stats = orchestrator.stats();
    info!(
        attempts = stats.attempts.load(Ordering::Relaxed),
        conflicts = stats.conflicts.load(Ordering::Relaxed),
        "Delete finished"
    );

    let outcome = match &result {
        Ok(r) => DeleteOutcome::succeeded(r.deleted_count),
        Err(e) => DeleteOutcome::failed(e),
    };
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    result?;
    Ok(())
}
