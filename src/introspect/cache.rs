//! Short-lived snapshot cache
//!
//! Entries are keyed by the set of tables a snapshot covers. They expire
//! after a TTL and are dropped immediately when a repair touches any of
//! their tables.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::snapshot::SchemaSnapshot;

/// Default TTL for cached snapshots (30 seconds)
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(30);

/// Lower-cased, sorted set of table names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(BTreeSet<String>);

impl CacheKey {
    pub fn new<'a>(tables: impl IntoIterator<Item = &'a str>) -> Self {
        Self(tables.into_iter().map(|t| t.to_ascii_lowercase()).collect())
    }

    pub fn contains(&self, table: &str) -> bool {
        self.0.contains(&table.to_ascii_lowercase())
    }

    pub fn tables(&self) -> &BTreeSet<String> {
        &self.0
    }
}

/// Key/value store for introspected snapshots
///
/// Every invalidation advances an epoch. A reader takes the epoch before it
/// goes to the database and hands it back to [`put`](Self::put), so a read
/// that raced with a repair is never stored.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Fresh snapshot for exactly this table set, if any
    async fn get(&self, key: &CacheKey) -> Option<SchemaSnapshot>;

    /// Current invalidation epoch
    async fn epoch(&self) -> u64;

    /// Store a snapshot read at `read_epoch`
    ///
    /// Returns false, storing nothing, when any table in `key` was
    /// invalidated after `read_epoch` or caching is disabled.
    async fn put(&self, key: CacheKey, snapshot: SchemaSnapshot, read_epoch: u64) -> bool;

    /// Drop every entry covering `table`; returns how many were dropped
    async fn invalidate_table(&self, table: &str) -> usize;

    async fn clear(&self);
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, (Instant, SchemaSnapshot)>,
    epoch: u64,
    /// lower-cased table -> epoch of its last invalidation
    invalidated: HashMap<String, u64>,
    cleared: u64,
}

impl CacheState {
    fn stale_since(&self, key: &CacheKey, read_epoch: u64) -> bool {
        self.cleared > read_epoch
            || key
                .tables()
                .iter()
                .any(|t| self.invalidated.get(t).is_some_and(|at| *at > read_epoch))
    }
}

/// In-process [`SnapshotCache`] with a fixed TTL
///
/// A zero TTL disables caching.
pub struct MemorySnapshotCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl MemorySnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}

impl Default for MemorySnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_TTL)
    }
}

#[async_trait]
impl SnapshotCache for MemorySnapshotCache {
    async fn get(&self, key: &CacheKey) -> Option<SchemaSnapshot> {
        {
            let state = self.state.read().await;
            match state.entries.get(key) {
                None => return None,
                Some((stored_at, snapshot)) if stored_at.elapsed() < self.ttl => {
                    return Some(snapshot.clone())
                }
                Some(_) => {}
            }
        }

        // expired: evict under the write lock
        let mut state = self.state.write().await;
        if let Some((stored_at, _)) = state.entries.get(key) {
            if stored_at.elapsed() >= self.ttl {
                state.entries.remove(key);
            }
        }
        None
    }

    async fn epoch(&self) -> u64 {
        self.state.read().await.epoch
    }

    async fn put(&self, key: CacheKey, snapshot: SchemaSnapshot, read_epoch: u64) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let mut state = self.state.write().await;
        if state.stale_since(&key, read_epoch) {
            return false;
        }
        state.entries.insert(key, (Instant::now(), snapshot));
        true
    }

    async fn invalidate_table(&self, table: &str) -> usize {
        let mut state = self.state.write().await;
        state.epoch += 1;
        let epoch = state.epoch;
        state.invalidated.insert(table.to_ascii_lowercase(), epoch);

        let before = state.entries.len();
        state.entries.retain(|key, _| !key.contains(table));
        before - state.entries.len()
    }

    async fn clear(&self) {
        let mut state = self.state.write().await;
        state.epoch += 1;
        state.cleared = state.epoch;
        state.entries.clear();
    }
}
