//! SQL predicate compiler.
//!
//! Turns structured filters into SQL text for the query engine. Identifiers
//! are checked against the [`TableRegistry`]; values are rendered as literals,
//! strings with embedded single quotes doubled.

use crate::query::tables::TableRegistry;
use crate::{Result, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt::Write as _;

/// Largest `LIMIT` a caller may ask for.
pub const MAX_QUERY_LIMIT: i64 = 10_000;

/// `LIMIT` used when the caller gives none.
pub const DEFAULT_QUERY_LIMIT: i64 = 100;

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Like,
}

impl FilterOperator {
    /// Parse the wire name (`eq`, `neq`, ...).
    pub fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "in" => Self::In,
            "like" => Self::Like,
            _ => return None,
        })
    }

    /// SQL spelling.
    pub fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "IN",
            Self::Like => "LIKE",
        }
    }
}

/// A single literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Number(Number),
    Text(String),
}

impl ScalarValue {
    fn write_sql(&self, out: &mut String) {
        match self {
            ScalarValue::Number(n) => {
                let _ = write!(out, "{}", n);
            }
            ScalarValue::Text(s) => {
                out.push('\'');
                out.push_str(&escape_string(s));
                out.push('\'');
            }
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Text(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        ScalarValue::Number(n.into())
    }
}

/// Filter value: a literal, or a list of literals for `in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Scalar(ScalarValue),
    List(Vec<ScalarValue>),
}

impl From<ScalarValue> for FilterValue {
    fn from(value: ScalarValue) -> Self {
        FilterValue::Scalar(value)
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::Scalar(s.into())
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        FilterValue::Scalar(n.into())
    }
}

/// One `column op value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub column: String,
    /// Operator wire name, checked at compile time
    pub op: String,
    pub value: FilterValue,
}

impl QueryFilter {
    pub fn new(column: impl Into<String>, op: impl Into<String>, value: FilterValue) -> Self {
        Self {
            column: column.into(),
            op: op.into(),
            value,
        }
    }
}

/// Double every single quote.
pub fn escape_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Inputs for [`PredicateCompiler::build_select_query`].
#[derive(Debug, Clone, Default)]
pub struct SelectQueryArgs<'a> {
    pub table: &'a str,
    pub namespace: &'a str,
    pub filters: &'a [QueryFilter],
    /// Empty selects `*`
    pub columns: &'a [String],
    pub limit: Option<i64>,
}

/// Compiles validated filters into SQL.
#[derive(Debug, Clone, Default)]
pub struct PredicateCompiler {
    registry: TableRegistry,
}

impl PredicateCompiler {
    /// Create a compiler over a table registry.
    pub fn new(registry: TableRegistry) -> Self {
        Self { registry }
    }

    /// Table allow-lists in use.
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// `" WHERE c1 AND c2 ..."`, or an empty string for no filters.
    pub fn build_where_clause(&self, table: &str, filters: &[QueryFilter]) -> Result<String> {
        if filters.is_empty() {
            return Ok(String::new());
        }

        let mut conditions = Vec::with_capacity(filters.len());
        for filter in filters {
            conditions.push(self.build_condition(table, filter)?);
        }

        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }

    fn build_condition(&self, table: &str, filter: &QueryFilter) -> Result<String> {
        if !self.registry.is_valid_column(table, &filter.column) {
            return Err(ValidationError::InvalidColumn(filter.column.clone()).into());
        }

        let op = FilterOperator::parse(&filter.op)
            .ok_or_else(|| ValidationError::InvalidOperator(filter.op.clone()))?;

        let mut condition = format!("{} {} ", filter.column, op.sql());
        match (op, &filter.value) {
            (FilterOperator::In, FilterValue::List(values)) => {
                condition.push('(');
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        condition.push_str(", ");
                    }
                    value.write_sql(&mut condition);
                }
                condition.push(')');
            }
            (FilterOperator::In, FilterValue::Scalar(_)) => {
                return Err(ValidationError::InRequiresArray(filter.column.clone()).into());
            }
            (_, FilterValue::List(_)) => {
                return Err(ValidationError::ArrayNotAllowed(filter.column.clone()).into());
            }
            (_, FilterValue::Scalar(value)) => value.write_sql(&mut condition),
        }

        Ok(condition)
    }

    /// `SELECT <cols> FROM <namespace>.<table>[ WHERE ...] LIMIT <n>`.
    ///
    /// The limit defaults to [`DEFAULT_QUERY_LIMIT`] and is clamped into
    /// `[1, MAX_QUERY_LIMIT]`.
    pub fn build_select_query(&self, args: &SelectQueryArgs<'_>) -> Result<String> {
        let limit = args
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT);
        self.compose_select(args, limit)
    }

    /// Select of `id_column` only, with an exact limit.
    ///
    /// Used to resolve delete targets, where the limit sits just above the
    /// row ceiling and must not be clamped.
    pub fn build_id_query(
        &self,
        table: &str,
        namespace: &str,
        filters: &[QueryFilter],
        id_column: &str,
        limit: i64,
    ) -> Result<String> {
        let columns = [id_column.to_string()];
        self.compose_select(
            &SelectQueryArgs {
                table,
                namespace,
                filters,
                columns: &columns,
                limit: None,
            },
            limit.max(1),
        )
    }

    fn compose_select(&self, args: &SelectQueryArgs<'_>, limit: i64) -> Result<String> {
        self.registry.ensure_table(args.table)?;

        let column_list = if args.columns.is_empty() {
            "*".to_string()
        } else {
            for column in args.columns {
                if !self.registry.is_valid_column(args.table, column) {
                    return Err(ValidationError::InvalidColumn(column.clone()).into());
                }
            }
            args.columns.join(", ")
        };

        let where_clause = self.build_where_clause(args.table, args.filters)?;

        Ok(format!(
            "SELECT {} FROM {}.{}{} LIMIT {}",
            column_list, args.namespace, args.table, where_clause, limit
        ))
    }
}
