//! cachemon — process-local TTL cache pools with performance monitoring.
//!
//! Shields slow producers (LLM calls, paginated content APIs, image
//! resolution) behind named, size-bounded, TTL-expiring cache pools with
//! coarse LRU eviction, and pairs them with a monitor that times
//! operations, samples memory, classifies threshold breaches, and triggers
//! cleanup. Everything is in-memory and process-local; nothing persists
//! across restarts.
//!
//! # Layout
//! - [`cache::CachePool`] — one named pool: bounded map, TTL, hit/miss counters
//! - [`cache::CacheRegistry`] — the fixed set of pools plus hashing and sweeps
//! - [`cache::Memoizer`] — lookup-or-compute wrapper for async producers
//! - [`monitor::PerformanceMonitor`] — advisory timing/memory/error tracking
//!
//! # Wiring
//! ```
//! use std::sync::Arc;
//! use cachemon::{wire, CacheRegistry, Config, PerformanceMonitor};
//!
//! let config = Config::default();
//! let registry = Arc::new(CacheRegistry::from_config(&config));
//! let monitor = PerformanceMonitor::from_config(&config);
//! wire(&registry, &monitor);
//!
//! registry.set_cached("llm", "key", serde_json::json!("commentary"), None);
//! assert!(registry.get_cached("llm", "key").is_some());
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod monitor;

pub use cache::{CachePool, CacheRegistry, Memoizer, PoolStats};
pub use config::{Config, PoolConfig, Thresholds};
pub use error::{Error, Result};
pub use monitor::{
    spawn_cleanup_task, PerformanceMonitor, PerformanceSummary, Severity, ThresholdBreach,
};

use std::sync::Arc;

/// Connect a registry and a monitor.
///
/// The registry reports cross-cutting hit/miss events to the monitor, and
/// the monitor's cleanup hook runs the registry's expired-entry sweep. The
/// hook holds a `Weak` reference, so the pair does not keep each other
/// alive.
pub fn wire(registry: &Arc<CacheRegistry>, monitor: &PerformanceMonitor) {
    registry.set_monitor(monitor.clone());
    let weak = Arc::downgrade(registry);
    monitor.set_cleanup_hook(Arc::new(move || {
        if let Some(registry) = weak.upgrade() {
            registry.cleanup_expired_entries();
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_wire_connects_monitor_and_cleanup() {
        let mut config = Config::default();
        config
            .pools
            .get_mut("search")
            .unwrap()
            .default_ttl_seconds = 0;
        let registry = Arc::new(CacheRegistry::from_config(&config));
        let monitor = PerformanceMonitor::from_config(&config);
        wire(&registry, &monitor);

        // Hit/miss events flow into the monitor through the registry.
        registry.set_cached("llm", "k", json!(1), None);
        let _ = registry.get_cached("llm", "k");
        let _ = registry.get_cached("llm", "missing");
        let summary = monitor.summary();
        assert!((summary.cache_efficiency["llm"] - 50.0).abs() < 1e-9);

        // Cleanup flows back: the zero-TTL search entry is swept.
        registry.set_cached("search", "stale", json!(2), None);
        monitor.trigger_cleanup();
        assert_eq!(registry.pool("search").unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_memoized_producer() {
        let config = Config::default();
        let registry = Arc::new(CacheRegistry::from_config(&config));
        let monitor = PerformanceMonitor::from_config(&config);
        wire(&registry, &monitor);

        let memo = Memoizer::new(Arc::clone(&registry), "llm")
            .with_ttl(Duration::from_secs(3600));

        for _ in 0..2 {
            let out: Result<serde_json::Value, std::convert::Infallible> = memo
                .get_or_compute("commentary", &["d'oh", "homer"], || async {
                    Ok(json!("a meditation on futility"))
                })
                .await;
            assert_eq!(out.unwrap(), json!("a meditation on futility"));
        }

        let stats = registry.global_stats();
        assert_eq!(stats["llm"].size, 1);
        assert_eq!(stats["llm"].hits, 1);
        // Monitor observed the same traffic cross-cuttingly.
        let summary = monitor.summary();
        assert!(summary.cache_efficiency.contains_key("llm"));
    }
}
