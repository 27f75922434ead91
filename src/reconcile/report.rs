//! Reconciliation reports

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::diff::DriftItem;
use crate::model::RejectedModel;
use crate::repair::{FailedRepair, RepairOutcome, SkipReason, SkippedRepair};

/// Terminal status of one reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconciliationStatus {
    /// Live schema matches every declared model
    Clean,
    /// Drift exists and nothing was applied
    DriftFound,
    /// At least one repair was applied and nothing failed
    Repaired,
    /// Introspection failed, a repair failed or the run was cancelled
    PartialFailure,
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconciliationStatus::Clean => "clean",
            ReconciliationStatus::DriftFound => "drift-found",
            ReconciliationStatus::Repaired => "repaired",
            ReconciliationStatus::PartialFailure => "partial-failure",
        };
        write!(f, "{}", s)
    }
}

/// Result of reconciling one service's declared models
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub service_name: String,
    pub run_id: Uuid,
    pub checked_at: DateTime<Utc>,
    pub status: ReconciliationStatus,
    pub drift: Vec<DriftItem>,
    pub applied: Vec<DriftItem>,
    pub failed: Vec<FailedRepair>,
    pub skipped: Vec<SkippedRepair>,
    pub rejected: Vec<RejectedModel>,
    pub notes: Vec<String>,
    /// Introspection failure, if the live schema could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when cancellation stopped the repair phase early
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl ReconciliationReport {
    pub(crate) fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            run_id: Uuid::new_v4(),
            checked_at: Utc::now(),
            status: ReconciliationStatus::Clean,
            drift: vec![],
            applied: vec![],
            failed: vec![],
            skipped: vec![],
            rejected: vec![],
            notes: vec![],
            error: None,
            cancelled: false,
        }
    }

    pub(crate) fn absorb(&mut self, outcome: RepairOutcome) {
        self.applied = outcome.applied;
        self.failed = outcome.failed;
        self.skipped = outcome.skipped;
        self.cancelled = outcome.cancelled;
    }

    /// Derive `status` from the rest of the report
    pub(crate) fn finish(mut self) -> Self {
        self.status = if self.error.is_some() || !self.failed.is_empty() || self.cancelled {
            ReconciliationStatus::PartialFailure
        } else if !self.applied.is_empty() {
            ReconciliationStatus::Repaired
        } else if !self.drift.is_empty() {
            ReconciliationStatus::DriftFound
        } else {
            ReconciliationStatus::Clean
        };
        self
    }

    pub fn is_clean(&self) -> bool {
        self.status == ReconciliationStatus::Clean
    }

    /// Drift that no automatic repair will ever resolve
    pub fn destructive_drift(&self) -> impl Iterator<Item = &DriftItem> {
        self.drift.iter().filter(|d| d.destructive)
    }

    /// Skipped items with the given reason
    pub fn skipped_for(&self, reason: SkipReason) -> impl Iterator<Item = &DriftItem> {
        self.skipped
            .iter()
            .filter(move |s| s.reason == reason)
            .map(|s| &s.item)
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "service {}: {} (drift {}, applied {}, failed {}, skipped {}, rejected {})",
            self.service_name,
            self.status,
            self.drift.len(),
            self.applied.len(),
            self.failed.len(),
            self.skipped.len(),
            self.rejected.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldSpec, FieldType};

    fn missing_column() -> DriftItem {
        DriftItem::missing_column("t", &FieldSpec::new("c", FieldType::Text))
    }

    #[test]
    fn test_status_precedence() {
        let report = ReconciliationReport::new("svc").finish();
        assert_eq!(report.status, ReconciliationStatus::Clean);

        let mut report = ReconciliationReport::new("svc");
        report.drift.push(missing_column());
        assert_eq!(report.finish().status, ReconciliationStatus::DriftFound);

        let mut report = ReconciliationReport::new("svc");
        report.drift.push(missing_column());
        report.applied.push(missing_column());
        assert_eq!(report.finish().status, ReconciliationStatus::Repaired);

        let mut report = ReconciliationReport::new("svc");
        report.applied.push(missing_column());
        report.failed.push(FailedRepair {
            item: missing_column(),
            error: "boom".to_string(),
        });
        assert_eq!(report.finish().status, ReconciliationStatus::PartialFailure);

        let mut report = ReconciliationReport::new("svc");
        report.error = Some("unreachable".to_string());
        assert_eq!(report.finish().status, ReconciliationStatus::PartialFailure);
    }

    #[test]
    fn test_serialized_shape() {
        let mut report = ReconciliationReport::new("billing");
        report.drift.push(missing_column());
        let report = report.finish();

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["service_name"], "billing");
        assert_eq!(value["status"], "drift-found");
        assert_eq!(value["drift"][0]["kind"], "MissingColumn");
        assert!(value.get("error").is_none());
        assert!(value.get("cancelled").is_none());
    }
}
