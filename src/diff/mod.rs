//! Drift detection
//!
//! [`diff`] compares declared models against a [`SchemaSnapshot`] and lists
//! every structural difference. It is a pure function; the order of its
//! output is also the order in which repairs are applied.

pub mod compat;

pub use compat::{compatible_types, is_compatible, normalize_physical_type};

use crate::introspect::SchemaSnapshot;
use crate::model::{FieldSpec, FieldType, ModelInfo};
use serde::Serialize;
use std::fmt;

/// Kind of structural difference
///
/// Variant order is the within-table ordering of drift items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DriftKind {
    MissingTable,
    MissingColumn,
    TypeMismatch,
    ExtraColumn,
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftKind::MissingTable => "missing-table",
            DriftKind::MissingColumn => "missing-column",
            DriftKind::TypeMismatch => "type-mismatch",
            DriftKind::ExtraColumn => "extra-column",
        };
        write!(f, "{}", s)
    }
}

/// One detected inconsistency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftItem {
    pub kind: DriftKind,
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// Declared semantic type, where a declaration exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared: Option<FieldType>,
    /// Live physical type, where a live column exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub destructive: bool,
    /// Full declared column list, only set for `MissingTable`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<FieldSpec>,
}

impl DriftItem {
    pub fn missing_table(model: &ModelInfo) -> Self {
        Self {
            kind: DriftKind::MissingTable,
            table_name: model.table_name().to_string(),
            field_name: None,
            declared: None,
            actual: None,
            destructive: false,
            columns: model.fields().to_vec(),
        }
    }

    pub fn missing_column(table_name: &str, field: &FieldSpec) -> Self {
        Self {
            kind: DriftKind::MissingColumn,
            table_name: table_name.to_string(),
            field_name: Some(field.name.clone()),
            declared: Some(field.field_type),
            actual: None,
            destructive: false,
            columns: Vec::new(),
        }
    }

    /// Changing a live column's type may lose data, so mismatches count as
    /// destructive
    pub fn type_mismatch(table_name: &str, field: &FieldSpec, actual: &str) -> Self {
        Self {
            kind: DriftKind::TypeMismatch,
            table_name: table_name.to_string(),
            field_name: Some(field.name.clone()),
            declared: Some(field.field_type),
            actual: Some(actual.to_string()),
            destructive: true,
            columns: Vec::new(),
        }
    }

    pub fn extra_column(table_name: &str, column: &str, actual: &str) -> Self {
        Self {
            kind: DriftKind::ExtraColumn,
            table_name: table_name.to_string(),
            field_name: Some(column.to_string()),
            declared: None,
            actual: Some(actual.to_string()),
            destructive: true,
            columns: Vec::new(),
        }
    }

    /// Short human-readable description
    pub fn describe(&self) -> String {
        let field = self.field_name.as_deref().unwrap_or("");
        match self.kind {
            DriftKind::MissingTable => format!(
                "table {} is missing ({} declared columns)",
                self.table_name,
                self.columns.len()
            ),
            DriftKind::MissingColumn => format!(
                "column {}.{} is missing",
                self.table_name, field
            ),
            DriftKind::TypeMismatch => format!(
                "column {}.{} is {} but declared {}",
                self.table_name,
                field,
                self.actual.as_deref().unwrap_or("untyped"),
                self.declared.map(|t| t.name()).unwrap_or("?")
            ),
            DriftKind::ExtraColumn => format!(
                "column {}.{} is not declared",
                self.table_name, field
            ),
        }
    }
}

/// Compute drift between declared models and a live snapshot
///
/// Tables are visited in lexicographic `table_name` order. Within a table,
/// items follow [`DriftKind`] order, declared fields keep declaration order
/// and extra columns keep live column order. Names match ignoring case.
pub fn diff(declared: &[ModelInfo], live: &SchemaSnapshot) -> Vec<DriftItem> {
    let mut models: Vec<&ModelInfo> = declared.iter().collect();
    models.sort_by(|a, b| a.table_name().cmp(b.table_name()));

    let mut drift = Vec::new();
    for model in models {
        let table_name = model.table_name();
        let Some(table) = live.table(table_name) else {
            drift.push(DriftItem::missing_table(model));
            continue;
        };

        let mut missing = Vec::new();
        let mut mismatched = Vec::new();
        for field in model.fields() {
            match table.column(&field.name) {
                None => missing.push(DriftItem::missing_column(table_name, field)),
                Some(col) if !is_compatible(field.field_type, &col.physical_type) => {
                    mismatched.push(DriftItem::type_mismatch(
                        table_name,
                        field,
                        &col.physical_type,
                    ));
                }
                Some(_) => {}
            }
        }

        let extra = table
            .columns
            .iter()
            .filter(|col| model.field(&col.name).is_none())
            .map(|col| DriftItem::extra_column(table_name, &col.name, &col.physical_type));

        drift.extend(missing);
        drift.extend(mismatched);
        drift.extend(extra);
    }

    drift
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{LiveColumn, LiveTable};
    use crate::model::normalize;
    use serde_json::json;

    fn models(raw: Vec<serde_json::Value>) -> Vec<ModelInfo> {
        normalize("svc", &raw).unwrap().valid
    }

    #[test]
    fn test_missing_tables_sorted() {
        let declared = models(vec![
            json!({"name": "C", "table_name": "charlie", "fields": {"id": "integer"}}),
            json!({"name": "A", "table_name": "alpha", "fields": {"id": "integer", "x": "text"}}),
            json!({"name": "B", "table_name": "bravo", "fields": {"id": "integer"}}),
        ]);

        let drift = diff(&declared, &SchemaSnapshot::default());
        let tables: Vec<&str> = drift.iter().map(|d| d.table_name.as_str()).collect();
        assert_eq!(tables, vec!["alpha", "bravo", "charlie"]);
        assert!(drift.iter().all(|d| d.kind == DriftKind::MissingTable));
        assert!(drift.iter().all(|d| !d.destructive));
        // columns travel with the table item, not as separate entries
        assert_eq!(drift[0].columns.len(), 2);
    }

    #[test]
    fn test_column_drift_ordering() {
        let declared = models(vec![json!({
            "name": "User",
            "table_name": "users",
            "fields": {"id": "integer", "email": "text", "age": "integer", "bio": "text"}
        })]);
        let live = SchemaSnapshot::new(vec![LiveTable::new(
            "users",
            vec![
                LiveColumn::new("legacy_flag", "INTEGER"),
                LiveColumn::new("id", "INTEGER"),
                LiveColumn::new("age", "TEXT"),
                LiveColumn::new("nickname", "TEXT"),
            ],
        )]);

        let drift = diff(&declared, &live);
        let summary: Vec<(DriftKind, &str)> = drift
            .iter()
            .map(|d| (d.kind, d.field_name.as_deref().unwrap_or("")))
            .collect();
        assert_eq!(
            summary,
            vec![
                (DriftKind::MissingColumn, "email"),
                (DriftKind::MissingColumn, "bio"),
                (DriftKind::TypeMismatch, "age"),
                (DriftKind::ExtraColumn, "legacy_flag"),
                (DriftKind::ExtraColumn, "nickname"),
            ]
        );

        let mismatch = &drift[2];
        assert_eq!(mismatch.declared, Some(FieldType::Integer));
        assert_eq!(mismatch.actual.as_deref(), Some("TEXT"));
        assert!(mismatch.destructive);
        assert!(drift[3].destructive && drift[4].destructive);
    }

    #[test]
    fn test_casing_differences_are_not_drift() {
        let declared = models(vec![json!({
            "name": "Account",
            "table_name": "Accounts",
            "fields": {"UserId": "integer", "displayName": "text"}
        })]);
        let live = SchemaSnapshot::new(vec![LiveTable::new(
            "accounts",
            vec![
                LiveColumn::new("userid", "integer"),
                LiveColumn::new("DISPLAYNAME", "varchar(100)"),
            ],
        )]);

        assert!(diff(&declared, &live).is_empty());
    }

    #[test]
    fn test_matching_schema_is_clean() {
        let declared = models(vec![json!({
            "name": "TestModel",
            "table_name": "test_table",
            "fields": {"id": "integer", "name": "text"}
        })]);
        let live = SchemaSnapshot::new(vec![LiveTable::new(
            "test_table",
            vec![
                LiveColumn::new("id", "INTEGER"),
                LiveColumn::new("name", "TEXT"),
            ],
        )]);

        assert!(diff(&declared, &live).is_empty());
    }

    #[test]
    fn test_describe() {
        let item = DriftItem::extra_column("users", "legacy", "TEXT");
        assert_eq!(item.describe(), "column users.legacy is not declared");
        assert_eq!(item.kind.to_string(), "extra-column");
    }
}
