//! Subcommand implementations.

pub mod delete;
pub mod query;

use anyhow::{bail, Result};
use icedel_core::query::FilterValue;
use icedel_core::QueryFilter;

/// Parse a `column:op:value` filter argument.
///
/// The value is read as JSON when it parses (`1600`, `["a","b"]`, `"007"`)
/// and taken as a plain string otherwise.
pub fn parse_filter(arg: &str) -> Result<QueryFilter> {
    let mut parts = arg.splitn(3, ':');
    let (Some(column), Some(op), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("Filter must look like column:op:value, got {:?}", arg);
    };
    if column.is_empty() || op.is_empty() {
        bail!("Filter must look like column:op:value, got {:?}", arg);
    }

    let value = serde_json::from_str::<FilterValue>(raw).unwrap_or_else(|_| raw.into());
    Ok(QueryFilter::new(column, op, value))
}
