//! Service-facing facade

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ModelsyncConfig;
use crate::database::{SchemaBackend, SqliteBackend};
use crate::error::ReconcileError;
use crate::introspect::{Introspector, MemorySnapshotCache, SnapshotCache};
use crate::model::{self, ModelInfo, TableRegistry};
use crate::reconcile::{ConsistencyChecker, ReconciliationReport};
use crate::repair::TableLocks;

/// Entry point used by services sharing one database
///
/// Owns the table registry, the snapshot cache and the repair locks, so one
/// manager should be shared by every service talking to the same database.
pub struct DatabaseManager {
    checker: ConsistencyChecker,
    registry: TableRegistry,
}

impl DatabaseManager {
    /// Build a manager over injected collaborators
    pub fn with_backend(backend: Arc<dyn SchemaBackend>, cache: Arc<dyn SnapshotCache>) -> Self {
        let introspector = Introspector::new(backend, cache);
        Self {
            checker: ConsistencyChecker::new(introspector, Arc::new(TableLocks::new())),
            registry: TableRegistry::new(),
        }
    }

    /// Open the SQLite database named by `config`
    pub fn open(config: &ModelsyncConfig) -> anyhow::Result<Self> {
        let path = config.sqlite_path();
        if config.database_path.is_none() {
            crate::database::ensure_data_dir(&config.data_dir)?;
        }
        let backend = SqliteBackend::open(&path, config.statement_timeout())?;
        info!("opened shared database at {}", path);
        Ok(Self::with_backend(
            Arc::new(backend),
            Arc::new(MemorySnapshotCache::new(config.snapshot_cache_ttl())),
        ))
    }

    /// Manager over a private in-memory database
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::with_backend(
            Arc::new(SqliteBackend::open_in_memory()?),
            Arc::new(MemorySnapshotCache::default()),
        ))
    }

    /// Register a service's models and return the valid ones
    ///
    /// Invalid declarations and tables owned by other services are dropped
    /// from the result. With `auto_create_tables` the live schema is
    /// reconciled right away; the report is logged.
    pub async fn register_models(
        &self,
        service_name: &str,
        models: &[Value],
        auto_create_tables: bool,
    ) -> Result<Vec<ModelInfo>, ReconcileError> {
        let (valid, _) = self
            .register_models_with_report(service_name, models, auto_create_tables)
            .await?;
        Ok(valid)
    }

    /// [`register_models`](Self::register_models), also returning the
    /// reconciliation report when one was produced
    pub async fn register_models_with_report(
        &self,
        service_name: &str,
        models: &[Value],
        auto_create_tables: bool,
    ) -> Result<(Vec<ModelInfo>, Option<ReconciliationReport>), ReconcileError> {
        let normalized = model::normalize(service_name, models)?;
        let accepted = self.registry.claim(service_name, normalized);
        for rejected in &accepted.rejected {
            warn!("service {}: {}", service_name, rejected.reason);
        }

        let valid = accepted.valid.clone();
        if !auto_create_tables || valid.is_empty() {
            return Ok((valid, None));
        }

        let report = self
            .checker
            .reconcile_models(service_name, accepted, true, &CancellationToken::new())
            .await?;
        info!("{}", report.summary());
        Ok((valid, Some(report)))
    }

    /// Read-only consistency check of `models` against the live schema
    pub async fn check_consistency(
        &self,
        service_name: &str,
        models: &[Value],
    ) -> Result<ReconciliationReport, ReconcileError> {
        let normalized = model::normalize(service_name, models)?;
        let normalized = self.registry.check(service_name, normalized);
        self.checker
            .reconcile_models(service_name, normalized, false, &CancellationToken::new())
            .await
    }

    /// Re-check the models `service_name` registered earlier
    ///
    /// Returns `None` for a service that never registered.
    pub async fn check_registered(
        &self,
        service_name: &str,
    ) -> Result<Option<ReconciliationReport>, ReconcileError> {
        let Some(valid) = self.registry.models(service_name) else {
            return Ok(None);
        };
        let normalized = model::Normalized {
            valid,
            rejected: vec![],
        };
        let report = self
            .checker
            .reconcile_models(service_name, normalized, false, &CancellationToken::new())
            .await?;
        Ok(Some(report))
    }

    /// Check every registered service concurrently, in service name order
    pub async fn check_all_registered(&self) -> Vec<ReconciliationReport> {
        let services = self.registry.services();
        let checks = services.iter().map(|s| self.check_registered(s));

        join_all(checks)
            .await
            .into_iter()
            .zip(services.iter())
            .filter_map(|(result, service)| match result {
                Ok(report) => report,
                Err(e) => {
                    warn!("service {}: {}", service, e);
                    None
                }
            })
            .collect()
    }

    /// Models a service registered last
    pub fn registered_models(&self, service_name: &str) -> Vec<ModelInfo> {
        self.registry.models(service_name).unwrap_or_default()
    }

    /// Forget a service's registration and release its tables
    ///
    /// The tables themselves are left in place.
    pub fn unregister_service(&self, service_name: &str) -> bool {
        self.registry.release(service_name)
    }

    pub fn checker(&self) -> &ConsistencyChecker {
        &self.checker
    }
}
