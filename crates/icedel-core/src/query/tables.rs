//! Queryable tables and their column allow-lists.
//!
//! Table and column names are spliced into SQL text, so only names present in
//! the registry ever reach the query engine.

use crate::config::TableColumnsConfig;
use crate::{Result, ValidationError};
use std::collections::{BTreeMap, HashMap};

const HORSE_RACING_RECORDS_COLUMNS: &[&str] = &[
    "id",
    "race_date",
    "racecourse",
    "race_number",
    "race_name",
    "horse_id",
    "horse_name",
    "finishing_position",
    "post_position",
    "jockey_name",
    "trainer_name",
    "weight_carried",
    "odds",
    "popularity",
    "finish_time",
    "margin",
    "prize_money",
    "created_at",
];

const HORSE_INFO_COLUMNS: &[&str] = &[
    "id",
    "horse_id",
    "horse_name",
    "sex",
    "birth_year",
    "color",
    "sire",
    "dam",
    "dam_sire",
    "breeder",
    "owner",
    "trainer",
    "country",
    "debut_date",
    "total_races",
    "total_wins",
    "total_earnings",
    "created_at",
    "updated_at",
];

const RACE_INFO_COLUMNS: &[&str] = &[
    "id",
    "race_hash",
    "race_date",
    "racecourse",
    "race_number",
    "race_name",
    "grade",
    "surface",
    "distance",
    "direction",
    "weather",
    "track_condition",
    "start_time",
    "field_size",
    "purse",
    "ticket_win",
    "ticket_place",
    "ticket_quinella",
    "ticket_exacta",
    "ticket_trio",
    "ticket_trifecta",
    "created_at",
];

/// Allow-listed tables and their columns.
#[derive(Debug, Clone)]
pub struct TableRegistry {
    tables: BTreeMap<String, Vec<String>>,
}

impl TableRegistry {
    /// Registry holding the built-in horse racing tables.
    pub fn builtin() -> Self {
        let tables = [
            ("horse_racing_records", HORSE_RACING_RECORDS_COLUMNS),
            ("horse_info", HORSE_INFO_COLUMNS),
            ("race_info", RACE_INFO_COLUMNS),
        ]
        .into_iter()
        .map(|(table, columns)| {
            (
                table.to_string(),
                columns.iter().map(|c| c.to_string()).collect(),
            )
        })
        .collect();

        Self { tables }
    }

    /// Built-in tables, with configured tables added or replacing them.
    pub fn with_overrides(overrides: &HashMap<String, TableColumnsConfig>) -> Self {
        let mut registry = Self::builtin();
        for (table, config) in overrides {
            registry.insert(table.clone(), config.columns.clone());
        }
        registry
    }

    /// Add or replace a table.
    pub fn insert(&mut self, table: impl Into<String>, columns: Vec<String>) {
        self.tables.insert(table.into(), columns);
    }

    /// Whether `table` is queryable.
    pub fn is_valid_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Whether `column` belongs to `table`. Unknown tables have no columns.
    pub fn is_valid_column(&self, table: &str, column: &str) -> bool {
        self.columns(table).iter().any(|c| c == column)
    }

    /// Columns of `table`, empty when unknown.
    pub fn columns(&self, table: &str) -> &[String] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Reject tables outside the registry.
    pub fn ensure_table(&self, table: &str) -> Result<()> {
        if self.is_valid_table(table) {
            Ok(())
        } else {
            Err(ValidationError::InvalidTable(table.to_string()).into())
        }
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
