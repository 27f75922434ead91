//! Repair planning
//!
//! Turns drift into DDL actions grouped by table. Items that must not be
//! auto-applied are kept aside with the reason, never dropped.

use crate::diff::{DriftItem, DriftKind};
use crate::model::{FieldSpec, FieldType};
use serde::Serialize;
use std::fmt;

/// Why a drift item was not repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Repair would remove or rewrite live structure
    Destructive,
    /// Kind is never repaired automatically
    NotAutoRepairable,
    /// An earlier action on the same table failed
    DependencyFailed,
    /// The live schema already had the change when the action ran
    AlreadySatisfied,
    /// Reconciliation was cancelled before this table was started
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Destructive => "destructive",
            SkipReason::NotAutoRepairable => "not auto-repairable",
            SkipReason::DependencyFailed => "dependency failed",
            SkipReason::AlreadySatisfied => "already satisfied",
            SkipReason::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// A drift item left unrepaired
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRepair {
    pub item: DriftItem,
    pub reason: SkipReason,
}

/// One DDL operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairAction {
    CreateTable {
        table: String,
        columns: Vec<FieldSpec>,
    },
    AddColumn {
        table: String,
        column: String,
        field_type: FieldType,
    },
}

impl RepairAction {
    /// Build the action repairing `item`, if it has one
    pub fn for_item(item: &DriftItem) -> Option<Self> {
        if item.destructive {
            return None;
        }
        match item.kind {
            DriftKind::MissingTable => Some(RepairAction::CreateTable {
                table: item.table_name.clone(),
                columns: item.columns.clone(),
            }),
            DriftKind::MissingColumn => Some(RepairAction::AddColumn {
                table: item.table_name.clone(),
                column: item.field_name.clone()?,
                field_type: item.declared?,
            }),
            DriftKind::TypeMismatch | DriftKind::ExtraColumn => None,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            RepairAction::CreateTable { table, .. } | RepairAction::AddColumn { table, .. } => {
                table
            }
        }
    }
}

/// Actions for one table, in application order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePlan {
    pub table: String,
    pub steps: Vec<(DriftItem, RepairAction)>,
}

/// Ordered repair plan plus the items set aside
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    pub tables: Vec<TablePlan>,
    pub skipped: Vec<SkippedRepair>,
}

impl RepairPlan {
    /// Plan repairs for drift in diff order
    ///
    /// Consecutive items for the same table form one [`TablePlan`]; the diff
    /// engine emits each table's items together, so every table appears
    /// once.
    pub fn from_drift(drift: &[DriftItem]) -> Self {
        let mut plan = RepairPlan::default();

        for item in drift {
            let Some(action) = RepairAction::for_item(item) else {
                let reason = if item.destructive {
                    SkipReason::Destructive
                } else {
                    SkipReason::NotAutoRepairable
                };
                plan.skipped.push(SkippedRepair {
                    item: item.clone(),
                    reason,
                });
                continue;
            };

            match plan.tables.last_mut() {
                Some(last) if last.table.eq_ignore_ascii_case(&item.table_name) => {
                    last.steps.push((item.clone(), action));
                }
                _ => plan.tables.push(TablePlan {
                    table: item.table_name.clone(),
                    steps: vec![(item.clone(), action)],
                }),
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of DDL actions in the plan
    pub fn action_count(&self) -> usize {
        self.tables.iter().map(|t| t.steps.len()).sum()
    }
}
