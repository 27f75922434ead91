//! Table-scoped advisory locks
//!
//! Two reconciliation runs (say, a retried request and the original) must
//! not issue DDL against the same table at the same time. Each table gets
//! one async mutex; a run holds it only while that table's repair actions
//! execute.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

/// Held while a table is being repaired; released on drop
pub struct TableGuard {
    table: String,
    _guard: OwnedMutexGuard<()>,
}

impl TableGuard {
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Registry of per-table locks, keyed by lower-cased table name
#[derive(Default)]
pub struct TableLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, table: &str) -> Arc<Mutex<()>> {
        let key = table.to_ascii_lowercase();
        if let Some(lock) = self.locks.read().await.get(&key) {
            return Arc::clone(lock);
        }
        let mut locks = self.locks.write().await;
        Arc::clone(locks.entry(key).or_default())
    }

    /// Wait for exclusive access to `table`
    pub async fn acquire(&self, table: &str) -> TableGuard {
        let lock = self.lock_for(table).await;
        let guard = lock.lock_owned().await;
        debug!("acquired repair lock for {}", table);
        TableGuard {
            table: table.to_string(),
            _guard: guard,
        }
    }

    /// Whether some run currently holds the lock for `table`
    #[cfg(test)]
    pub(crate) async fn is_locked(&self, table: &str) -> bool {
        match self.locks.read().await.get(&table.to_ascii_lowercase()) {
            Some(lock) => lock.try_lock().is_err(),
            None => false,
        }
    }
}
