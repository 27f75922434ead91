//! Reconciliation orchestrator
//!
//! A run moves through `Normalizing -> Introspecting -> Diffing ->
//! (Repairing) -> Done`. Only an invalid service name fails the call; every
//! other problem ends up in the returned [`ReconciliationReport`].

mod report;

pub use report::{ReconciliationReport, ReconciliationStatus};

use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::diff::diff;
use crate::error::ReconcileError;
use crate::introspect::Introspector;
use crate::model::{self, Normalized};
use crate::repair::{RepairExecutor, TableLocks};

/// Phase of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Normalizing,
    Introspecting,
    Diffing,
    Repairing,
    Done,
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconcileState::Normalizing => "normalizing",
            ReconcileState::Introspecting => "introspecting",
            ReconcileState::Diffing => "diffing",
            ReconcileState::Repairing => "repairing",
            ReconcileState::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// Detects drift for one service at a time and optionally repairs it
pub struct ConsistencyChecker {
    introspector: Introspector,
    executor: RepairExecutor,
}

impl ConsistencyChecker {
    pub fn new(introspector: Introspector, locks: Arc<TableLocks>) -> Self {
        let executor = RepairExecutor::new(introspector.clone(), locks);
        Self {
            introspector,
            executor,
        }
    }

    pub fn introspector(&self) -> &Introspector {
        &self.introspector
    }

    /// Read-only drift check
    pub async fn run_check(
        &self,
        service_name: &str,
        raw_models: &[Value],
    ) -> Result<ReconciliationReport, ReconcileError> {
        self.reconcile(service_name, raw_models, false).await
    }

    /// Check, and repair non-destructive drift when `auto_repair` is set
    pub async fn reconcile(
        &self,
        service_name: &str,
        raw_models: &[Value],
        auto_repair: bool,
    ) -> Result<ReconciliationReport, ReconcileError> {
        self.reconcile_with_cancel(
            service_name,
            raw_models,
            auto_repair,
            &CancellationToken::new(),
        )
        .await
    }

    /// [`reconcile`](Self::reconcile) that stops starting new tables once
    /// `cancel` fires
    pub async fn reconcile_with_cancel(
        &self,
        service_name: &str,
        raw_models: &[Value],
        auto_repair: bool,
        cancel: &CancellationToken,
    ) -> Result<ReconciliationReport, ReconcileError> {
        trace_state(service_name, ReconcileState::Normalizing);
        let normalized = model::normalize(service_name, raw_models)?;
        self.reconcile_models(service_name, normalized, auto_repair, cancel)
            .await
    }

    /// Reconcile models that were already normalized
    pub async fn reconcile_models(
        &self,
        service_name: &str,
        normalized: Normalized,
        auto_repair: bool,
        cancel: &CancellationToken,
    ) -> Result<ReconciliationReport, ReconcileError> {
        model::validate_service_name(service_name)?;

        let Normalized { valid, rejected } = normalized;
        let mut report = ReconciliationReport::new(service_name);
        if !rejected.is_empty() {
            report
                .notes
                .push(format!("{} model declaration(s) rejected", rejected.len()));
        }
        report.rejected = rejected;

        if valid.is_empty() {
            report
                .notes
                .push("no valid models declared; live schema not inspected".to_string());
            trace_state(service_name, ReconcileState::Done);
            return Ok(report.finish());
        }

        trace_state(service_name, ReconcileState::Introspecting);
        let tables: BTreeSet<String> = valid.iter().map(|m| m.table_name().to_string()).collect();
        let snapshot = match self.introspector.snapshot(&tables).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("service {}: {}", service_name, e);
                report.error = Some(e.to_string());
                trace_state(service_name, ReconcileState::Done);
                return Ok(report.finish());
            }
        };

        trace_state(service_name, ReconcileState::Diffing);
        report.drift = diff(&valid, &snapshot);

        if auto_repair && !report.drift.is_empty() {
            trace_state(service_name, ReconcileState::Repairing);
            let outcome = self.executor.repair(&report.drift, cancel).await;
            report.absorb(outcome);
            if report.cancelled {
                report
                    .notes
                    .push("repair cancelled before all tables were processed".to_string());
            }
        } else if !auto_repair {
            let repairable = report.drift.iter().filter(|d| !d.destructive).count();
            if repairable > 0 {
                report.notes.push(format!(
                    "{} repairable item(s) left unapplied (check only)",
                    repairable
                ));
            }
        }

        trace_state(service_name, ReconcileState::Done);
        let report = report.finish();
        info!("{}", report.summary());
        Ok(report)
    }
}

fn trace_state(service_name: &str, state: ReconcileState) {
    debug!("service {}: {}", service_name, state);
}
