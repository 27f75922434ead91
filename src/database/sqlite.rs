//! SQLite implementation of [`SchemaBackend`]
//!
//! rusqlite is blocking, so every round trip runs on tokio's blocking pool
//! and is bounded by the configured statement timeout.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::database::backend::SchemaBackend;
use crate::database::core::{ApplyOutcome, DatabaseConn, SchemaManager};
use crate::error::{IntrospectionError, RepairError};
use crate::introspect::SchemaSnapshot;
use crate::repair::RepairAction;

/// Default bound on a single database round trip
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(10);

const PENDING: u8 = 0;
const STARTED: u8 = 1;
const ABANDONED: u8 = 2;

/// Result of one bounded round trip
enum RoundTrip<T> {
    Finished(T),
    /// The deadline passed before the connection was free; nothing ran
    Abandoned,
    /// The deadline passed after the work had started
    Overran(JoinHandle<Option<T>>),
    Panicked(JoinError),
}

/// Shared SQLite connection used as the reconciliation backend
///
/// Every round trip first waits for the shared connection and the timeout
/// covers that wait, so a long statement from one caller can time out
/// another caller's unrelated read. A call that times out before it gets
/// the connection never runs. Reads that are already running when the
/// deadline passes are abandoned; DDL that is already running is awaited
/// and its real outcome returned, so the timeout only bounds the wait
/// before a DDL statement starts.
#[derive(Clone)]
pub struct SqliteBackend {
    db: Arc<Mutex<DatabaseConn>>,
    timeout: Duration,
}

impl SqliteBackend {
    /// Wrap an open connection
    pub fn new(db: DatabaseConn, timeout: Duration) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            timeout,
        }
    }

    /// Open the database file at `path`
    pub fn open(path: &str, timeout: Duration) -> anyhow::Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        db.set_busy_timeout(timeout)?;
        Ok(Self::new(db, timeout))
    }

    /// Create a backend over a fresh in-memory database
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(
            DatabaseConn::open_in_memory()?,
            DEFAULT_STATEMENT_TIMEOUT,
        ))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a closure against the connection on the current thread
    ///
    /// Meant for setup work such as seeding tables in tests or tooling.
    pub fn with_conn<R>(&self, f: impl FnOnce(&DatabaseConn) -> R) -> R {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        f(&db)
    }

    /// Run `f` on the blocking pool once the connection is free
    ///
    /// If the deadline passes while `f` is still waiting for the connection,
    /// `f` is marked abandoned and skipped when the lock finally comes.
    async fn round_trip<T, F>(&self, f: F) -> RoundTrip<T>
    where
        T: Send + 'static,
        F: FnOnce(&DatabaseConn) -> T + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let state = Arc::new(AtomicU8::new(PENDING));
        let claim = Arc::clone(&state);

        let mut task = tokio::task::spawn_blocking(move || {
            let db = db.lock().unwrap_or_else(PoisonError::into_inner);
            if claim
                .compare_exchange(PENDING, STARTED, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return None;
            }
            Some(f(&db))
        });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(Some(value))) => RoundTrip::Finished(value),
            Ok(Ok(None)) => RoundTrip::Abandoned,
            Ok(Err(e)) => RoundTrip::Panicked(e),
            Err(_) => {
                let abandoned = state
                    .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if abandoned {
                    RoundTrip::Abandoned
                } else {
                    RoundTrip::Overran(task)
                }
            }
        }
    }
}

#[async_trait]
impl SchemaBackend for SqliteBackend {
    async fn introspect(
        &self,
        tables: &BTreeSet<String>,
    ) -> Result<SchemaSnapshot, IntrospectionError> {
        let names: Vec<String> = tables.iter().cloned().collect();
        debug!("introspecting {} table(s)", names.len());

        let read = self
            .round_trip(move |db| {
                SchemaManager::new(&db.conn)
                    .read_snapshot(names.iter().map(String::as_str))
                    .map_err(IntrospectionError::from)
            })
            .await;

        match read {
            RoundTrip::Finished(result) => result,
            RoundTrip::Abandoned | RoundTrip::Overran(_) => {
                Err(IntrospectionError::Timeout(self.timeout.as_millis()))
            }
            RoundTrip::Panicked(e) => Err(IntrospectionError::Task(e.to_string())),
        }
    }

    async fn apply(&self, action: &RepairAction) -> Result<ApplyOutcome, RepairError> {
        let table = action.table().to_string();
        let owned = action.clone();

        let run = self
            .round_trip(move |db| SchemaManager::new(&db.conn).apply(&owned))
            .await;

        let result = match run {
            RoundTrip::Finished(result) => result,
            RoundTrip::Abandoned => {
                return Err(RepairError::Timeout {
                    table,
                    millis: self.timeout.as_millis(),
                })
            }
            RoundTrip::Overran(task) => {
                warn!(
                    "DDL on {} still running after {} ms, waiting for it to finish",
                    table,
                    self.timeout.as_millis()
                );
                match task.await {
                    Ok(Some(result)) => result,
                    Ok(None) => {
                        return Err(RepairError::Timeout {
                            table,
                            millis: self.timeout.as_millis(),
                        })
                    }
                    Err(e) => {
                        return Err(RepairError::Task {
                            table,
                            message: e.to_string(),
                        })
                    }
                }
            }
            RoundTrip::Panicked(e) => {
                return Err(RepairError::Task {
                    table,
                    message: e.to_string(),
                })
            }
        };

        result.map_err(|e| RepairError::database(table, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldSpec, FieldType};

    fn tables(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_introspect_only_requested_tables() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.with_conn(|db| {
            db.execute("CREATE TABLE wanted (id INTEGER)").unwrap();
            db.execute("CREATE TABLE other (id INTEGER)").unwrap();
        });

        let snapshot = backend
            .introspect(&tables(&["wanted", "absent"]))
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains("wanted"));
        assert!(!snapshot.contains("other"));
    }

    #[tokio::test]
    async fn test_apply_reports_database_errors() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let action = RepairAction::AddColumn {
            table: "ghost".to_string(),
            column: "x".to_string(),
            field_type: FieldType::Text,
        };

        let err = backend.apply(&action).await.unwrap_err();
        assert!(matches!(err, RepairError::Database { .. }));
        assert_eq!(err.table(), "ghost");
    }

    #[tokio::test]
    async fn test_apply_create_table() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let action = RepairAction::CreateTable {
            table: "test_table".to_string(),
            columns: vec![
                FieldSpec::new("id", FieldType::Integer),
                FieldSpec::new("name", FieldType::Text),
            ],
        };

        assert_eq!(backend.apply(&action).await.unwrap(), ApplyOutcome::Applied);
        assert!(backend.with_conn(|db| db.table_exists("test_table").unwrap()));
    }

    #[tokio::test]
    async fn test_open_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.sqlite3");
        let backend =
            SqliteBackend::open(path.to_str().unwrap(), Duration::from_secs(5)).unwrap();
        assert_eq!(backend.timeout(), Duration::from_secs(5));

        let snapshot = backend.introspect(&tables(&["anything"])).await.unwrap();
        assert!(snapshot.is_empty());
    }

    /// Hold the shared connection on another thread for `hold`
    fn hold_connection(backend: &SqliteBackend, hold: Duration) -> std::thread::JoinHandle<()> {
        let backend = backend.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            backend.with_conn(|_| {
                tx.send(()).unwrap();
                std::thread::sleep(hold);
            });
        });
        rx.recv().unwrap();
        holder
    }

    #[tokio::test]
    async fn test_busy_connection_times_out_and_skips_ddl() {
        let backend = SqliteBackend::new(
            DatabaseConn::open_in_memory().unwrap(),
            Duration::from_millis(100),
        );
        let action = RepairAction::CreateTable {
            table: "late_table".to_string(),
            columns: vec![FieldSpec::new("id", FieldType::Integer)],
        };

        let holder = hold_connection(&backend, Duration::from_millis(400));

        let err = backend.introspect(&tables(&["late_table"])).await.unwrap_err();
        assert!(matches!(err, IntrospectionError::Timeout(100)));
        assert!(err.to_string().contains("timed out"));

        let err = backend.apply(&action).await.unwrap_err();
        assert!(matches!(err, RepairError::Timeout { millis: 100, .. }));
        assert_eq!(err.table(), "late_table");

        holder.join().unwrap();

        // the timed-out DDL never ran once the connection came free
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!backend.with_conn(|db| db.table_exists("late_table").unwrap()));

        assert_eq!(backend.apply(&action).await.unwrap(), ApplyOutcome::Applied);
        assert!(backend.with_conn(|db| db.table_exists("late_table").unwrap()));
    }

    #[tokio::test]
    async fn test_started_work_runs_to_completion() {
        let backend = SqliteBackend::new(
            DatabaseConn::open_in_memory().unwrap(),
            Duration::from_millis(50),
        );

        let run = backend
            .round_trip(|db| {
                std::thread::sleep(Duration::from_millis(200));
                db.execute("CREATE TABLE slow (id INTEGER)").unwrap();
                7
            })
            .await;

        let RoundTrip::Overran(task) = run else {
            panic!("expected the round trip to overrun its deadline");
        };
        assert_eq!(task.await.unwrap(), Some(7));
        assert!(backend.with_conn(|db| db.table_exists("slow").unwrap()));
    }
}

