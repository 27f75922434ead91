//! Repair planning and execution
//!
//! Only non-destructive drift is ever repaired: missing tables are created
//! with exactly their declared columns and missing columns are added.
//! Everything else is handed back untouched so it stays visible in the
//! report.

mod locks;
mod plan;

pub use locks::{TableGuard, TableLocks};
pub use plan::{RepairAction, RepairPlan, SkipReason, SkippedRepair, TablePlan};

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::database::{ApplyOutcome, SchemaBackend};
use crate::diff::DriftItem;
use crate::introspect::Introspector;

/// A repair that was attempted and failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRepair {
    pub item: DriftItem,
    pub error: String,
}

/// What happened to each drift item handed to the executor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    pub applied: Vec<DriftItem>,
    pub failed: Vec<FailedRepair>,
    pub skipped: Vec<SkippedRepair>,
    /// Cancellation stopped the run before every table was processed
    pub cancelled: bool,
}

/// Applies repair plans table by table
pub struct RepairExecutor {
    backend: Arc<dyn SchemaBackend>,
    introspector: Introspector,
    locks: Arc<TableLocks>,
}

impl RepairExecutor {
    pub fn new(introspector: Introspector, locks: Arc<TableLocks>) -> Self {
        Self {
            backend: Arc::clone(introspector.backend()),
            introspector,
            locks,
        }
    }

    /// Repair `drift` in order
    ///
    /// Tables are processed one at a time under their advisory lock. A failed
    /// action skips the rest of its table but not other tables. Cancellation
    /// is checked before each table; a table already in progress finishes.
    pub async fn repair(&self, drift: &[DriftItem], cancel: &CancellationToken) -> RepairOutcome {
        let plan = RepairPlan::from_drift(drift);
        debug!(
            "repair plan: {} action(s) over {} table(s), {} item(s) set aside",
            plan.action_count(),
            plan.tables.len(),
            plan.skipped.len()
        );
        let mut outcome = RepairOutcome {
            skipped: plan.skipped,
            ..Default::default()
        };

        let mut tables = plan.tables.into_iter();
        while let Some(table_plan) = tables.next() {
            if cancel.is_cancelled() {
                info!("repair cancelled before table {}", table_plan.table);
                outcome.cancelled = true;
                for rest in std::iter::once(table_plan).chain(tables.by_ref()) {
                    outcome
                        .skipped
                        .extend(rest.steps.into_iter().map(|(item, _)| SkippedRepair {
                            item,
                            reason: SkipReason::Cancelled,
                        }));
                }
                break;
            }

            self.repair_table(table_plan, &mut outcome).await;
        }

        outcome
    }

    /// Apply one table's steps under its lock
    ///
    /// The cache is invalidated after any attempted action, failed ones
    /// included, since a failure does not prove the table is unchanged.
    async fn repair_table(&self, table_plan: TablePlan, outcome: &mut RepairOutcome) {
        let guard = self.locks.acquire(&table_plan.table).await;
        let mut touched = false;
        let mut blocked = false;

        for (item, action) in table_plan.steps {
            if blocked {
                outcome.skipped.push(SkippedRepair {
                    item,
                    reason: SkipReason::DependencyFailed,
                });
                continue;
            }

            match self.backend.apply(&action).await {
                Ok(ApplyOutcome::Applied) => {
                    info!("applied {} on {}", item.kind, item.table_name);
                    touched = true;
                    outcome.applied.push(item);
                }
                Ok(ApplyOutcome::AlreadySatisfied) => {
                    touched = true;
                    outcome.skipped.push(SkippedRepair {
                        item,
                        reason: SkipReason::AlreadySatisfied,
                    });
                }
                Err(e) => {
                    warn!("repair failed: {}", e);
                    touched = true;
                    blocked = true;
                    outcome.failed.push(FailedRepair {
                        item,
                        error: e.to_string(),
                    });
                }
            }
        }

        if touched {
            self.introspector.invalidate(guard.table()).await;
        }
        drop(guard);
    }
}
