//! Schema introspection
//!
//! The [`Introspector`] reads live structure for just the tables a
//! reconciliation run cares about, serving repeated reads from a
//! [`SnapshotCache`].

mod cache;
mod snapshot;

pub use cache::{CacheKey, MemorySnapshotCache, SnapshotCache, DEFAULT_SNAPSHOT_TTL};
pub use snapshot::{LiveColumn, LiveTable, SchemaSnapshot};

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::database::SchemaBackend;
use crate::error::IntrospectionError;

/// Cached reader of live table structure
#[derive(Clone)]
pub struct Introspector {
    backend: Arc<dyn SchemaBackend>,
    cache: Arc<dyn SnapshotCache>,
}

impl Introspector {
    pub fn new(backend: Arc<dyn SchemaBackend>, cache: Arc<dyn SnapshotCache>) -> Self {
        Self { backend, cache }
    }

    /// Snapshot of exactly `tables`
    ///
    /// Served from the cache when a fresh entry for the same table set
    /// exists; otherwise read from the backend and cached, unless one of
    /// the tables was invalidated while the read was in flight.
    pub async fn snapshot(
        &self,
        tables: &BTreeSet<String>,
    ) -> Result<SchemaSnapshot, IntrospectionError> {
        let key = CacheKey::new(tables.iter().map(String::as_str));
        if let Some(snapshot) = self.cache.get(&key).await {
            debug!("snapshot cache hit for {} table(s)", tables.len());
            return Ok(snapshot);
        }

        let read_epoch = self.cache.epoch().await;
        let snapshot = self.backend.introspect(tables).await?;
        if !self.cache.put(key, snapshot.clone(), read_epoch).await {
            debug!("not caching snapshot of {} table(s) read before an invalidation", tables.len());
        }
        Ok(snapshot)
    }

    /// Drop cached snapshots covering `table`
    pub async fn invalidate(&self, table: &str) {
        let dropped = self.cache.invalidate_table(table).await;
        if dropped > 0 {
            debug!("invalidated {} cached snapshot(s) for {}", dropped, table);
        }
    }

    pub fn backend(&self) -> &Arc<dyn SchemaBackend> {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CountingBackend;

    fn tables(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_second_read_is_cached() {
        let backend = Arc::new(CountingBackend::in_memory());
        let introspector =
            Introspector::new(backend.clone(), Arc::new(MemorySnapshotCache::default()));

        introspector.snapshot(&tables(&["a"])).await.unwrap();
        introspector.snapshot(&tables(&["a"])).await.unwrap();
        assert_eq!(backend.introspect_calls(), 1);

        introspector.snapshot(&tables(&["a", "b"])).await.unwrap();
        assert_eq!(backend.introspect_calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_read() {
        let backend = Arc::new(CountingBackend::in_memory());
        let introspector =
            Introspector::new(backend.clone(), Arc::new(MemorySnapshotCache::default()));

        let before = introspector.snapshot(&tables(&["a"])).await.unwrap();
        assert!(before.is_empty());

        backend.with_conn(|db| db.execute("CREATE TABLE a (id INTEGER)").unwrap());
        introspector.invalidate("A").await;

        let after = introspector.snapshot(&tables(&["a"])).await.unwrap();
        assert!(after.contains("a"));
        assert_eq!(backend.introspect_calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let backend = Arc::new(CountingBackend::in_memory());
        backend.fail_introspection_for("broken");
        let introspector =
            Introspector::new(backend.clone(), Arc::new(MemorySnapshotCache::default()));

        assert!(introspector.snapshot(&tables(&["broken"])).await.is_err());
        assert!(introspector.snapshot(&tables(&["broken"])).await.is_err());
        assert_eq!(backend.introspect_calls(), 2);
    }
}
