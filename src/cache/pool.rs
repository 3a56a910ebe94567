//! A single named cache pool with TTL expiry and coarse LRU eviction.
//!
//! Expiry is lazy (checked on `get`) plus an eager sweep via
//! [`CachePool::remove_expired`]. Eviction on overflow removes the oldest
//! quarter of entries by last access time in one pass; a full re-sort per
//! overflow is O(n log n) but the pools hold hundreds of entries at most.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// A cached value with its creation time and TTL. Immutable once inserted.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

#[derive(Debug, Default)]
struct PoolState {
    entries: HashMap<String, CacheEntry>,
    last_access: HashMap<String, Instant>,
    hits: u64,
    misses: u64,
}

/// Point-in-time statistics for one pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub size: usize,
    pub max_size: usize,
    /// Percentage of `get` calls that found a live entry; 0 with no requests.
    pub hit_rate: f64,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded key→value cache with per-entry TTL and hit/miss accounting.
///
/// Each pool owns its own lock, so contention on one pool never blocks
/// another. `get` and `set` hold the lock only for the map mutation itself;
/// callers must never compute values while holding a reference into the pool.
pub struct CachePool {
    name: String,
    max_size: usize,
    default_ttl: Duration,
    state: RwLock<PoolState>,
}

impl CachePool {
    /// Create an empty pool. `max_size` is clamped to a minimum of 1.
    pub fn new(name: impl Into<String>, max_size: usize, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            max_size: max_size.max(1),
            default_ttl,
            state: RwLock::new(PoolState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a live entry. A miss (absent or expired) is a normal outcome,
    /// never an error. Expired entries are removed on the spot.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Value> {
        let mut state = self.state.write().unwrap();
        match state.entries.get(key) {
            None => {
                state.misses += 1;
                None
            }
            Some(entry) if entry.is_expired(now) => {
                debug!(pool = %self.name, key = key.get(..16).unwrap_or(key), "Entry expired, removing");
                state.entries.remove(key);
                state.last_access.remove(key);
                state.misses += 1;
                None
            }
            Some(entry) => {
                let value = entry.value.clone();
                state.last_access.insert(key.to_string(), now);
                state.hits += 1;
                Some(value)
            }
        }
    }

    /// Insert or overwrite an entry. Racing writers for the same key are
    /// last-write-wins under the pool lock.
    ///
    /// When the pool is full, the least-recently-accessed quarter of entries
    /// (at least one) is evicted first, so `len() <= max_size` always holds
    /// after `set` returns.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        self.set_at(key, value, ttl, Instant::now());
    }

    fn set_at(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>, now: Instant) {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut state = self.state.write().unwrap();
        if state.entries.len() >= self.max_size {
            self.evict_oldest(&mut state);
        }
        state.last_access.insert(key.clone(), now);
        state.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                ttl,
            },
        );
    }

    /// Remove the least-recently-accessed `ceil(max_size / 4)` entries.
    fn evict_oldest(&self, state: &mut PoolState) {
        let mut by_access: Vec<(String, Instant)> = state
            .entries
            .keys()
            .map(|k| {
                let at = state
                    .last_access
                    .get(k)
                    .copied()
                    .unwrap_or_else(|| state.entries[k].created_at);
                (k.clone(), at)
            })
            .collect();
        by_access.sort_by_key(|(_, at)| *at);

        let to_remove = self.max_size.div_ceil(4);
        let mut removed = 0usize;
        for (key, _) in by_access.into_iter().take(to_remove) {
            state.entries.remove(&key);
            state.last_access.remove(&key);
            removed += 1;
        }
        debug!(pool = %self.name, removed, "Evicted least-recently-used entries");
    }

    /// Eagerly remove every expired entry. Returns the number removed.
    ///
    /// Independent of the lazy expiry in `get`; used by the registry sweep.
    pub fn remove_expired(&self) -> usize {
        self.remove_expired_at(Instant::now())
    }

    fn remove_expired_at(&self, now: Instant) -> usize {
        let mut state = self.state.write().unwrap();
        let before = state.entries.len();
        state.entries.retain(|_, e| !e.is_expired(now));
        let entries = std::mem::take(&mut state.entries);
        state.last_access.retain(|k, _| entries.contains_key(k));
        state.entries = entries;
        let removed = before - state.entries.len();
        if removed > 0 {
            // Give freed capacity back after a large sweep.
            state.entries.shrink_to_fit();
            state.last_access.shrink_to_fit();
        }
        removed
    }

    /// Empty the pool and reset the hit/miss counters.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap();
        state.entries.clear();
        state.last_access.clear();
        state.hits = 0;
        state.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().unwrap().entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.read().unwrap().entries.contains_key(key)
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.read().unwrap();
        let total = state.hits + state.misses;
        let hit_rate = if total > 0 {
            state.hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        PoolStats {
            size: state.entries.len(),
            max_size: self.max_size,
            hit_rate,
            hits: state.hits,
            misses: state.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pool(max_size: usize, ttl_secs: u64) -> CachePool {
        CachePool::new("test", max_size, Duration::from_secs(ttl_secs))
    }

    #[test]
    fn test_get_never_set_is_miss() {
        let p = pool(10, 60);
        assert!(p.get("never").is_none());
        let stats = p.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_set_then_get_hits() {
        let p = pool(10, 60);
        p.set("k", json!("v"), None);
        assert_eq!(p.get("k"), Some(json!("v")));
        let stats = p.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_expired_entry_is_removed_and_counts_miss() {
        let p = pool(10, 60);
        let t0 = Instant::now();
        p.set_at("k", json!("v"), None, t0);
        // Exactly at the TTL boundary the entry is stale.
        assert!(p.get_at("k", t0 + Duration::from_secs(60)).is_none());
        assert!(!p.contains_key("k"));
        assert_eq!(p.stats().misses, 1);
    }

    #[test]
    fn test_expired_multibyte_key_logs_without_panicking() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let p = pool(10, 60);
            // 1 ascii byte + 9 two-byte chars puts byte 16 inside a char.
            let key: String = std::iter::once('a').chain("α".repeat(9).chars()).collect();
            let t0 = Instant::now();
            p.set_at(&key, json!("v"), Some(Duration::ZERO), t0);
            assert!(p.get_at(&key, t0 + Duration::from_secs(1)).is_none());
            assert!(!p.contains_key(&key));
        });
    }

    #[test]
    fn test_entry_live_just_before_ttl() {
        let p = pool(10, 60);
        let t0 = Instant::now();
        p.set_at("k", json!("v"), None, t0);
        assert!(p
            .get_at("k", t0 + Duration::from_secs(59))
            .is_some());
    }

    #[test]
    fn test_per_entry_ttl_overrides_default() {
        let p = pool(10, 60);
        let t0 = Instant::now();
        p.set_at("k", json!(1), Some(Duration::from_secs(5)), t0);
        assert!(p.get_at("k", t0 + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_never_exceeds_max_size() {
        let p = pool(8, 60);
        for i in 0..50 {
            p.set(format!("k{i}"), json!(i), None);
            assert!(p.len() <= 8, "len {} exceeded max_size after set", p.len());
        }
    }

    #[test]
    fn test_overflow_evicts_quarter_least_recently_accessed() {
        let p = pool(4, 60);
        let t0 = Instant::now();
        p.set_at("a", json!(1), None, t0);
        p.set_at("b", json!(2), None, t0 + Duration::from_secs(1));
        p.set_at("c", json!(3), None, t0 + Duration::from_secs(2));
        p.set_at("d", json!(4), None, t0 + Duration::from_secs(3));
        // Touch `a` so it is the most recently accessed.
        assert!(p.get_at("a", t0 + Duration::from_secs(4)).is_some());
        // Overflow: ceil(4/4) = 1 eviction, the oldest untouched key is `b`.
        p.set_at("e", json!(5), None, t0 + Duration::from_secs(5));
        assert!(p.len() <= 4);
        assert!(p.contains_key("a"), "recently touched key must survive");
        assert!(!p.contains_key("b"), "least-recently-accessed key must go");
        assert!(p.contains_key("c"));
        assert!(p.contains_key("d"));
        assert!(p.contains_key("e"));
    }

    #[test]
    fn test_eviction_count_is_ceiling() {
        // ceil(10/4) = 3 entries must go on overflow.
        let p = pool(10, 60);
        let t0 = Instant::now();
        for i in 0..10 {
            p.set_at(format!("k{i}"), json!(i), None, t0 + Duration::from_secs(i));
        }
        p.set_at("overflow", json!(99), None, t0 + Duration::from_secs(100));
        assert_eq!(p.len(), 10 - 3 + 1);
        assert!(!p.contains_key("k0"));
        assert!(!p.contains_key("k1"));
        assert!(!p.contains_key("k2"));
        assert!(p.contains_key("k3"));
    }

    #[test]
    fn test_overwrite_same_key_keeps_size() {
        let p = pool(10, 60);
        p.set("k", json!(1), None);
        p.set("k", json!(2), None);
        assert_eq!(p.len(), 1);
        assert_eq!(p.get("k"), Some(json!(2)));
    }

    #[test]
    fn test_hit_rate_zero_without_requests() {
        let p = pool(10, 60);
        assert_eq!(p.stats().hit_rate, 0.0);
    }

    #[test]
    fn test_hit_rate_percentage() {
        let p = pool(10, 60);
        p.set("k", json!(1), None);
        let _ = p.get("k"); // hit
        let _ = p.get("k"); // hit
        let _ = p.get("missing"); // miss
        let stats = p.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_clear_resets_counters() {
        let p = pool(10, 60);
        p.set("k", json!(1), None);
        let _ = p.get("k");
        let _ = p.get("missing");
        p.clear();
        assert!(p.is_empty());
        let stats = p.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_remove_expired_sweeps_only_stale() {
        let p = pool(10, 60);
        let t0 = Instant::now();
        p.set_at("old", json!(1), Some(Duration::from_secs(10)), t0);
        p.set_at("fresh", json!(2), None, t0);
        let removed = p.remove_expired_at(t0 + Duration::from_secs(30));
        assert_eq!(removed, 1);
        assert!(!p.contains_key("old"));
        assert!(p.contains_key("fresh"));
    }

    #[test]
    fn test_max_size_zero_clamped() {
        let p = CachePool::new("tiny", 0, Duration::from_secs(60));
        p.set("k", json!(1), None);
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        let p = Arc::new(pool(64, 60));
        p.set("shared", json!("v"), None);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let p = Arc::clone(&p);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        assert!(p.get("shared").is_some());
                        p.set(format!("k{i}-{j}"), json!(j), None);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(p.len() <= 64);
    }
}
