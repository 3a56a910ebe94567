//! Configuration for cache pools, alert thresholds, and cleanup cadence.
//!
//! Loaded from a JSON file or built from [`Config::default`]. Every field
//! has a serde default so partial config files work.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Standard pool names wired up by [`Config::default`].
pub const POOL_LLM: &str = "llm";
pub const POOL_EPISODES: &str = "episodes";
pub const POOL_IMAGES: &str = "images";
pub const POOL_SEARCH: &str = "search";

/// Size and TTL policy for a single named cache pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Hard cap on entries before eviction triggers.
    pub max_size: usize,
    /// TTL applied when the caller omits one.
    pub default_ttl_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            default_ttl_seconds: 1800,
        }
    }
}

impl PoolConfig {
    pub fn new(max_size: usize, default_ttl_seconds: u64) -> Self {
        Self {
            max_size,
            default_ttl_seconds,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }
}

/// Alert classification boundaries. Immutable once the monitor is built.
///
/// Timing and memory boundaries use strict `>` (a value exactly at the
/// boundary is fine); the cache-hit minimum is inclusive (exactly at the
/// minimum does not warn).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub page_load_warning_s: f64,
    pub page_load_critical_s: f64,
    pub memory_warning_mb: f64,
    pub memory_critical_mb: f64,
    pub cache_hit_minimum_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            page_load_warning_s: 3.0,
            page_load_critical_s: 5.0,
            memory_warning_mb: 200.0,
            memory_critical_mb: 400.0,
            cache_hit_minimum_pct: 70.0,
        }
    }
}

/// Top-level configuration for the caching and monitoring layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Named pools, each with its own size/TTL policy.
    pub pools: BTreeMap<String, PoolConfig>,
    /// Performance alert thresholds.
    pub thresholds: Thresholds,
    /// Cadence of the periodic expired-entry sweep, in seconds.
    pub cleanup_interval_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        let mut pools = BTreeMap::new();
        // 24h for LLM responses, 1h for episode data, 30min for the rest.
        pools.insert(POOL_LLM.to_string(), PoolConfig::new(500, 86_400));
        pools.insert(POOL_EPISODES.to_string(), PoolConfig::new(200, 3_600));
        pools.insert(POOL_IMAGES.to_string(), PoolConfig::new(300, 1_800));
        pools.insert(POOL_SEARCH.to_string(), PoolConfig::new(100, 1_800));
        Self {
            pools,
            thresholds: Thresholds::default(),
            cleanup_interval_seconds: 1_800,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}
