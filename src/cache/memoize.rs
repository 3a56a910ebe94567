//! Memoization wrapper for expensive async producers.
//!
//! Derives a deterministic cache key from the producer's name and arguments,
//! probes an explicit registry pool, and only stores results the producer
//! returned successfully. Concurrent misses for the same key are collapsed
//! with a per-key lock so only one flight runs the producer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::registry::CacheRegistry;

/// Wraps producer calls with lookup-or-compute against one registry pool.
///
/// The pool is chosen explicitly at construction; there is no implicit
/// default. The producer must be a pure function of its arguments —
/// side effects or non-determinism make cached results wrong by
/// construction, and the wrapper cannot verify that precondition.
///
/// The producer always runs outside any pool lock. Its errors propagate
/// unchanged and are never cached, so a failed computation leaves the key
/// uncached for the next caller.
pub struct Memoizer {
    registry: Arc<CacheRegistry>,
    pool: String,
    ttl: Option<Duration>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl Memoizer {
    /// Create a memoizer bound to one named pool of `registry`.
    pub fn new(registry: Arc<CacheRegistry>, pool: impl Into<String>) -> Self {
        Self {
            registry,
            pool: pool.into(),
            ttl: None,
            in_flight: DashMap::new(),
        }
    }

    /// Override the pool's default TTL for entries stored by this memoizer.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Return the cached result for `(name, args)` or run `producer` to
    /// compute it.
    ///
    /// On a miss, the first caller for a given key acquires that key's
    /// flight lock and runs the producer; concurrent callers for the same
    /// key await the lock and then normally hit the freshly stored entry.
    /// The lock is dropped before the entry in the flight map is removed,
    /// so a late-arriving caller may in rare cases recompute — an accepted
    /// trade against keeping the map bounded.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        name: &str,
        args: &[&str],
        producer: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        let mut parts: Vec<&str> = Vec::with_capacity(args.len() + 1);
        parts.push(name);
        parts.extend_from_slice(args);
        let key = CacheRegistry::content_hash(&parts);

        if let Some(value) = self.registry.get_cached(&self.pool, &key) {
            return Ok(value);
        }

        let gate = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = gate.lock().await;

        // A concurrent flight may have stored the value while we waited.
        if let Some(value) = self.registry.get_cached(&self.pool, &key) {
            drop(guard);
            self.in_flight.remove(&key);
            return Ok(value);
        }

        debug!(pool = %self.pool, name, "Memoizer miss, running producer");
        let result = producer().await;
        if let Ok(ref value) = result {
            self.registry
                .set_cached(&self.pool, key.clone(), value.clone(), self.ttl);
        }

        drop(guard);
        self.in_flight.remove(&key);
        result
    }
}
