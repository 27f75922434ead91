//! Live schema snapshot types

use serde::Serialize;
use std::collections::BTreeMap;

/// One live column as reported by the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    pub name: String,
    /// Declared physical type, verbatim (may be empty in SQLite)
    pub physical_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    /// Column participates in at least one index
    pub indexed: bool,
}

impl LiveColumn {
    pub fn new(name: impl Into<String>, physical_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            physical_type: physical_type.into(),
            nullable: true,
            primary_key: false,
            indexed: false,
        }
    }
}

/// One live table with columns in table order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveTable {
    pub name: String,
    pub columns: Vec<LiveColumn>,
}

impl LiveTable {
    pub fn new(name: impl Into<String>, columns: Vec<LiveColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Find a column by name, ignoring case
    pub fn column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Point-in-time view of the requested tables
///
/// Keys are lower-cased table names; tables that do not exist are simply
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, LiveTable>,
}

impl SchemaSnapshot {
    pub fn new(tables: impl IntoIterator<Item = LiveTable>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.name.to_ascii_lowercase(), t))
                .collect(),
        }
    }

    /// Find a table by name, ignoring case
    pub fn table(&self, name: &str) -> Option<&LiveTable> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    pub fn tables(&self) -> impl Iterator<Item = &LiveTable> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
