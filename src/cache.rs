//! Per-principal permission snapshot cache
//!
//! TTL-bounded, thread-safe, with explicit invalidation. Lazy expiry on
//! read is sufficient for correctness; the optional background sweeper only
//! bounds memory. Rebuilds replace entries wholesale, so a rebuild race
//! between two requests is harmless: last write wins and both results are
//! equivalent.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::aggregate::PermissionSnapshot;
use crate::types::PrincipalId;

/// Snapshot cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for cached snapshots
    pub ttl: Duration,

    /// Maximum number of cached principals
    pub capacity: usize,

    /// Interval for the background expiry sweep; `None` disables it
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            capacity: 10_000,
            sweep_interval: None,
        }
    }
}

#[derive(Clone)]
struct CachedEntry {
    snapshot: Arc<PermissionSnapshot>,
    cached_at: Instant,
}

impl CachedEntry {
    fn new(snapshot: Arc<PermissionSnapshot>) -> Self {
        Self {
            snapshot,
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe snapshot cache keyed by principal id
pub struct SnapshotCache {
    entries: DashMap<PrincipalId, CachedEntry>,
    config: CacheConfig,
    stats: DashMap<String, usize>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotCache {
    /// Creates a cache; call [`SnapshotCache::start_sweeper`] afterwards if
    /// `sweep_interval` is configured
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: DashMap::new(),
            sweeper: Mutex::new(None),
        }
    }

    /// Returns the snapshot for a principal if present and fresh
    ///
    /// Expired entries are removed on read (lazy expiry).
    pub fn get(&self, principal_id: &str) -> Option<Arc<PermissionSnapshot>> {
        if let Some(entry) = self.entries.get(principal_id) {
            if entry.is_expired(self.config.ttl) {
                drop(entry);
                self.entries.remove(principal_id);
                self.increment_stat("expirations");
                self.increment_stat("misses");
                return None;
            }

            self.increment_stat("hits");
            return Some(Arc::clone(&entry.snapshot));
        }

        self.increment_stat("misses");
        None
    }

    /// Stores a freshly built snapshot, replacing any previous entry
    pub fn insert(&self, principal_id: &str, snapshot: PermissionSnapshot) -> Arc<PermissionSnapshot> {
        if self.entries.len() >= self.config.capacity
            && !self.entries.contains_key(principal_id)
        {
            self.evict_tranche();
        }

        let snapshot = Arc::new(snapshot);
        self.entries.insert(
            principal_id.to_string(),
            CachedEntry::new(Arc::clone(&snapshot)),
        );
        snapshot
    }

    /// Removes one principal's snapshot; the next read rebuilds it
    pub fn invalidate(&self, principal_id: &str) {
        if self.entries.remove(principal_id).is_some() {
            debug!(principal = %principal_id, "snapshot invalidated");
        }
    }

    /// Empties the whole cache
    pub fn clear(&self) {
        self.entries.clear();
        self.stats.clear();
    }

    /// Removes expired entries
    pub fn cleanup_expired(&self) {
        let ttl = self.config.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
    }

    /// Returns cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            entries: self.entries.len(),
            max_entries: self.config.capacity,
        }
    }

    /// The configured TTL
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Spawns the periodic expiry sweep if configured
    ///
    /// The task holds only a weak reference, so dropping the cache ends the
    /// sweep even without an explicit [`SnapshotCache::shutdown`].
    pub fn start_sweeper(self: &Arc<Self>) {
        let Some(interval) = self.config.sweep_interval else {
            return;
        };

        let weak: Weak<SnapshotCache> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => cache.cleanup_expired(),
                    None => break,
                }
            }
        });

        let mut guard = self.sweeper.lock();
        if let Some(old) = guard.replace(handle) {
            old.abort();
        }
    }

    /// Stops the background sweep, if running
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }

    // Drop roughly 10% of entries when at capacity; snapshots rebuild
    // cheaply so precise LRU ordering is not worth the bookkeeping
    fn evict_tranche(&self) {
        let to_remove = (self.config.capacity / 10).max(1);
        let mut removed = 0;
        self.entries.retain(|_, _| {
            if removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
    }

    fn increment_stat(&self, key: &str) {
        self.stats
            .entry(key.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

impl Drop for SnapshotCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PermissionSnapshot {
        PermissionSnapshot::default()
    }

    #[tokio::test]
    async fn test_get_put() {
        let cache = SnapshotCache::new(CacheConfig::default());

        assert!(cache.get("p1").is_none());
        cache.insert("p1", snapshot());
        assert!(cache.get("p1").is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(stats.hit_rate() > 0.0);
    }

    #[tokio::test]
    async fn test_ttl_expiry_on_read() {
        let cache = SnapshotCache::new(CacheConfig {
            ttl: Duration::from_millis(50),
            ..Default::default()
        });

        cache.insert("p1", snapshot());
        assert!(cache.get("p1").is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get("p1").is_none());
        assert!(cache.stats().expirations > 0);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = SnapshotCache::new(CacheConfig::default());
        cache.insert("p1", snapshot());
        cache.insert("p2", snapshot());

        cache.invalidate("p1");
        assert!(cache.get("p1").is_none());
        assert!(cache.get("p2").is_some());

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_capacity_eviction() {
        let cache = SnapshotCache::new(CacheConfig {
            capacity: 10,
            ..Default::default()
        });

        for i in 0..15 {
            cache.insert(&format!("p{}", i), snapshot());
        }

        assert!(cache.stats().entries <= 15);
        assert!(cache.stats().entries >= 10);
    }

    #[tokio::test]
    async fn test_sweeper_lifecycle() {
        let cache = Arc::new(SnapshotCache::new(CacheConfig {
            ttl: Duration::from_millis(20),
            sweep_interval: Some(Duration::from_millis(30)),
            ..Default::default()
        }));
        cache.start_sweeper();

        cache.insert("p1", snapshot());
        tokio::time::sleep(Duration::from_millis(120)).await;

        // Swept without any read touching the entry
        assert_eq!(cache.stats().entries, 0);

        cache.shutdown();
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let cache = Arc::new(SnapshotCache::new(CacheConfig::default()));
        let mut handles = Vec::new();

        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let id = format!("p{}", i % 4);
                cache.insert(&id, PermissionSnapshot::default());
                cache.get(&id).is_some()
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }
}
