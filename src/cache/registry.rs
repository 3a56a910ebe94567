//! Registry owning the fixed set of named cache pools.
//!
//! Pools are created once from [`Config`] and live for the process lifetime.
//! The registry provides deterministic content hashing for cache keys,
//! global stats, an eager expired-entry sweep, and clear-all with an
//! optional hook into a host-framework cache it does not own.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::cache::pool::{CachePool, PoolStats};
use crate::config::{Config, POOL_EPISODES, POOL_IMAGES, POOL_LLM, POOL_SEARCH};
use crate::monitor::PerformanceMonitor;

/// Callback into a collaborator-owned cache (e.g. a UI framework's own
/// memoization layer) cleared alongside the registry's pools.
pub type HostClearHook = Arc<dyn Fn() + Send + Sync>;

/// Owns several named [`CachePool`]s with distinct size/TTL policies.
///
/// Pool identity is stable for the process lifetime: pools are built at
/// construction and never added or removed afterwards. Each pool has its own
/// lock, so the registry itself never serializes access across pools.
pub struct CacheRegistry {
    pools: BTreeMap<String, CachePool>,
    monitor: RwLock<Option<PerformanceMonitor>>,
    host_clear: RwLock<Option<HostClearHook>>,
}

impl CacheRegistry {
    /// Build pools from configuration. The standard llm/episodes/images/search
    /// pools always exist; `config` overrides their policy and may add more.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Config::default();
        let pools = defaults
            .pools
            .iter()
            .chain(config.pools.iter())
            .map(|(name, pc)| {
                (
                    name.clone(),
                    CachePool::new(name.clone(), pc.max_size, pc.default_ttl()),
                )
            })
            .collect();
        Self {
            pools,
            monitor: RwLock::new(None),
            host_clear: RwLock::new(None),
        }
    }

    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Attach a monitor that receives a cross-cutting hit/miss event for
    /// every `get_cached` call. Observability only; pool counters stay
    /// authoritative.
    pub fn set_monitor(&self, monitor: PerformanceMonitor) {
        *self.monitor.write().unwrap() = Some(monitor);
    }

    /// Register a host-framework cache clear hook invoked by [`Self::clear_all`].
    pub fn set_host_clear_hook(&self, hook: HostClearHook) {
        *self.host_clear.write().unwrap() = Some(hook);
    }

    /// Direct access to a named pool.
    pub fn pool(&self, name: &str) -> Option<&CachePool> {
        self.pools.get(name)
    }

    /// The LLM response pool.
    pub fn llm(&self) -> &CachePool {
        self.standard(POOL_LLM)
    }

    /// The episode metadata pool.
    pub fn episodes(&self) -> &CachePool {
        self.standard(POOL_EPISODES)
    }

    /// The rendered image pool.
    pub fn images(&self) -> &CachePool {
        self.standard(POOL_IMAGES)
    }

    /// The search result pool.
    pub fn search(&self) -> &CachePool {
        self.standard(POOL_SEARCH)
    }

    fn standard(&self, name: &str) -> &CachePool {
        // from_config inserts the standard pools unconditionally.
        self.pools.get(name).expect("standard pool present")
    }

    /// Fetch from the named pool. An unknown pool name is a no-op miss
    /// (logged once per call, never an error).
    pub fn get_cached(&self, pool: &str, key: &str) -> Option<Value> {
        let Some(p) = self.pools.get(pool) else {
            warn!(pool, "get_cached on unknown pool");
            return None;
        };
        let value = p.get(key);
        let monitor = self.monitor.read().unwrap().clone();
        if let Some(monitor) = monitor {
            let _ = monitor.track_cache_hit(pool, value.is_some());
        }
        value
    }

    /// Store into the named pool, using the pool's default TTL when `ttl`
    /// is `None`. Unknown pool names are a logged no-op.
    pub fn set_cached(&self, pool: &str, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        match self.pools.get(pool) {
            Some(p) => p.set(key, value, ttl),
            None => warn!(pool, "set_cached on unknown pool"),
        }
    }

    /// Deterministic cache key from the given parts.
    ///
    /// SHA-256 over length-prefixed parts, hex encoded. Length prefixing
    /// keeps `["a|b", ""]` and `["a", "b"]` distinct, so identical logical
    /// inputs always collide to the same key and nothing else does.
    pub fn content_hash(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Eagerly sweep every pool for expired entries, independent of the lazy
    /// expiry in `get`. Returns the total number of entries removed.
    ///
    /// Freed map capacity is returned to the allocator inside each pool's
    /// sweep; Rust has no collector to nudge beyond that.
    pub fn cleanup_expired_entries(&self) -> usize {
        let mut removed = 0;
        for pool in self.pools.values() {
            removed += pool.remove_expired();
        }
        info!(removed, "Cache cleanup completed");
        removed
    }

    /// Stats snapshot for every pool, keyed by pool name.
    pub fn global_stats(&self) -> BTreeMap<String, PoolStats> {
        self.pools
            .iter()
            .map(|(name, pool)| (name.clone(), pool.stats()))
            .collect()
    }

    /// Clear every pool and invoke the host-framework clear hook if one is
    /// registered.
    pub fn clear_all(&self) {
        for pool in self.pools.values() {
            pool.clear();
        }
        let hook = self.host_clear.read().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }
        info!("All caches cleared");
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}
