//! Test doubles shared by the unit tests

use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::database::{ApplyOutcome, DatabaseConn, SchemaBackend, SqliteBackend};
use crate::error::{IntrospectionError, RepairError};
use crate::introspect::SchemaSnapshot;
use crate::repair::RepairAction;

/// Holds one introspection after it has read the database
#[derive(Default)]
pub struct IntrospectGate {
    /// Notified once the held read has its result
    pub reached: Notify,
    /// Notify to let the held read return
    pub release: Notify,
}

/// In-memory SQLite backend that counts calls and can be told to fail
pub struct CountingBackend {
    inner: SqliteBackend,
    introspect_calls: AtomicUsize,
    apply_calls: AtomicUsize,
    fail_introspect: Mutex<HashSet<String>>,
    fail_apply: Mutex<HashSet<String>>,
    gate: Mutex<Option<Arc<IntrospectGate>>>,
    cancel_after_apply: Mutex<Option<CancellationToken>>,
}

impl CountingBackend {
    pub fn in_memory() -> Self {
        Self {
            inner: SqliteBackend::open_in_memory().unwrap(),
            introspect_calls: AtomicUsize::new(0),
            apply_calls: AtomicUsize::new(0),
            fail_introspect: Mutex::new(HashSet::new()),
            fail_apply: Mutex::new(HashSet::new()),
            gate: Mutex::new(None),
            cancel_after_apply: Mutex::new(None),
        }
    }

    pub fn introspect_calls(&self) -> usize {
        self.introspect_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// Introspecting any table set containing `table` fails
    pub fn fail_introspection_for(&self, table: &str) {
        self.fail_introspect
            .lock()
            .unwrap()
            .insert(table.to_ascii_lowercase());
    }

    /// Every DDL action on `table` fails
    pub fn fail_repairs_for(&self, table: &str) {
        self.fail_apply
            .lock()
            .unwrap()
            .insert(table.to_ascii_lowercase());
    }

    /// The next introspection reads, then waits on the returned gate
    pub fn hold_next_introspection(&self) -> Arc<IntrospectGate> {
        let gate = Arc::new(IntrospectGate::default());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Cancel `token` as soon as the next DDL action has been applied
    pub fn cancel_after_apply(&self, token: CancellationToken) {
        *self.cancel_after_apply.lock().unwrap() = Some(token);
    }

    pub fn with_conn<R>(&self, f: impl FnOnce(&DatabaseConn) -> R) -> R {
        self.inner.with_conn(f)
    }
}

#[async_trait]
impl SchemaBackend for CountingBackend {
    async fn introspect(
        &self,
        tables: &BTreeSet<String>,
    ) -> Result<SchemaSnapshot, IntrospectionError> {
        self.introspect_calls.fetch_add(1, Ordering::SeqCst);
        let broken = tables.iter().any(|t| {
            self.fail_introspect
                .lock()
                .unwrap()
                .contains(&t.to_ascii_lowercase())
        });
        if broken {
            return Err(IntrospectionError::Database(
                "permission denied for schema".to_string(),
            ));
        }
        let snapshot = self.inner.introspect(tables).await;

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.reached.notify_one();
            gate.release.notified().await;
        }
        snapshot
    }

    async fn apply(&self, action: &RepairAction) -> Result<ApplyOutcome, RepairError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        let broken = self
            .fail_apply
            .lock()
            .unwrap()
            .contains(&action.table().to_ascii_lowercase());
        if broken {
            return Err(RepairError::database(action.table(), "permission denied"));
        }
        let outcome = self.inner.apply(action).await;

        let token = self.cancel_after_apply.lock().unwrap().take();
        if let Some(token) = token {
            token.cancel();
        }
        outcome
    }
}
