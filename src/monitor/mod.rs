//! Performance monitoring: timing/memory/error samples, threshold
//! classification, and cleanup triggering.
//!
//! The monitor only observes. Threshold breaches are advisory values plus
//! `tracing` events; they never fail or delay the caller's request. Cleanup
//! runs through hooks the monitor does not own (see [`crate::wire`]).

pub mod rss;
pub mod sweeper;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{Config, Thresholds};

pub use sweeper::spawn_cleanup_task;

/// Summaries cover samples from the last 10 minutes.
const SUMMARY_WINDOW: Duration = Duration::from_secs(600);
/// Memory samples are kept in a ring buffer of this many readings.
const MEMORY_SAMPLES_MAX: usize = 100;
/// Cache efficiency is only classified after this many observations.
const CACHE_ALERT_MIN_OBSERVATIONS: u64 = 10;
/// Collaborator session entries older than this are purged on cleanup.
const SESSION_PURGE_CUTOFF: Duration = Duration::from_secs(30 * 60);

/// Hook invoked on cleanup, typically the registry's expired-entry sweep.
pub type CleanupHook = Arc<dyn Fn() + Send + Sync>;
/// Hook purging collaborator-owned session caches older than the cutoff.
pub type SessionPurgeHook = Arc<dyn Fn(Duration) + Send + Sync>;

/// Advisory severity of a threshold breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Critical,
}

/// An advisory threshold breach. Never an error, never blocks a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdBreach {
    pub severity: Severity,
    /// Which measurement breached ("page_load", "memory", "cache_hit_rate").
    pub metric: &'static str,
    /// What identified the measurement (page name, pool name, ...).
    pub label: String,
    pub value: f64,
    pub limit: f64,
}

/// Rolling performance summary for a dashboard or CLI to render.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    /// Mean page load over the window, seconds. `None` without samples.
    pub avg_page_load_s: Option<f64>,
    /// Mean search time over the window, seconds.
    pub avg_search_time_s: Option<f64>,
    /// Cross-cutting hit rate per pool, percent.
    pub cache_efficiency: BTreeMap<String, f64>,
    /// Most recent memory reading, megabytes.
    pub current_memory_mb: Option<f64>,
    /// Error samples recorded inside the window.
    pub recent_errors: usize,
    /// Same errors broken down by source (`llm_error`, `api_error`).
    pub recent_errors_by_kind: BTreeMap<&'static str, usize>,
    /// Share of successful API calls inside the window, percent.
    pub api_success_rate: Option<f64>,
}

#[derive(Debug, Clone)]
struct TimedSample {
    secs: f64,
    at: Instant,
}

#[derive(Debug, Clone)]
struct ApiSample {
    success: bool,
    at: Instant,
}

#[derive(Debug, Clone)]
struct ErrorSample {
    kind: &'static str,
    at: Instant,
}

#[derive(Debug, Clone)]
struct MemorySample {
    mb: f64,
    at: Instant,
}

#[derive(Debug, Default, Clone, Copy)]
struct HitMiss {
    hits: u64,
    misses: u64,
}

struct MonitorState {
    page_loads: Vec<TimedSample>,
    searches: Vec<TimedSample>,
    llm_responses: Vec<TimedSample>,
    api_calls: Vec<ApiSample>,
    errors: Vec<ErrorSample>,
    memory: VecDeque<MemorySample>,
    cache_counts: HashMap<String, HitMiss>,
    last_cleanup: Instant,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            page_loads: Vec::new(),
            searches: Vec::new(),
            llm_responses: Vec::new(),
            api_calls: Vec::new(),
            errors: Vec::new(),
            memory: VecDeque::with_capacity(MEMORY_SAMPLES_MAX),
            cache_counts: HashMap::new(),
            last_cleanup: Instant::now(),
        }
    }
}

struct MonitorInner {
    thresholds: Thresholds,
    cleanup_interval: Duration,
    state: RwLock<MonitorState>,
    cleanup: RwLock<Option<CleanupHook>>,
    session_purge: RwLock<Option<SessionPurgeHook>>,
}

/// Process-wide performance monitor. Cheap to clone; clones share state.
///
/// Constructed once at startup and passed to handlers explicitly — there is
/// no hidden global instance, so tests build fresh isolated monitors.
#[derive(Clone)]
pub struct PerformanceMonitor {
    inner: Arc<MonitorInner>,
}

impl PerformanceMonitor {
    pub fn new(thresholds: Thresholds, cleanup_interval: Duration) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                thresholds,
                cleanup_interval,
                state: RwLock::new(MonitorState::new()),
                cleanup: RwLock::new(None),
                session_purge: RwLock::new(None),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.thresholds.clone(), config.cleanup_interval())
    }

    /// Attach the cleanup hook, typically the registry's sweep.
    pub fn set_cleanup_hook(&self, hook: CleanupHook) {
        *self.inner.cleanup.write().unwrap() = Some(hook);
    }

    /// Attach a collaborator session-cache purge hook. Receives the
    /// staleness cutoff (30 minutes).
    pub fn set_session_purge_hook(&self, hook: SessionPurgeHook) {
        *self.inner.session_purge.write().unwrap() = Some(hook);
    }

    // -- timing ------------------------------------------------------------

    /// Record a page load and classify it against the thresholds.
    ///
    /// Boundaries are strict `>`: a load exactly at the warning or critical
    /// threshold is not a breach of that level.
    pub fn track_page_load(&self, start: Instant, label: &str) -> Option<ThresholdBreach> {
        self.track_page_load_at(start, label, Instant::now())
    }

    fn track_page_load_at(
        &self,
        start: Instant,
        label: &str,
        now: Instant,
    ) -> Option<ThresholdBreach> {
        let secs = now.saturating_duration_since(start).as_secs_f64();
        self.inner
            .state
            .write()
            .unwrap()
            .page_loads
            .push(TimedSample { secs, at: now });
        info!(page = label, secs, "Page load");

        let t = &self.inner.thresholds;
        if secs > t.page_load_critical_s {
            error!(page = label, secs, "Critically slow page load");
            Some(ThresholdBreach {
                severity: Severity::Critical,
                metric: "page_load",
                label: label.to_string(),
                value: secs,
                limit: t.page_load_critical_s,
            })
        } else if secs > t.page_load_warning_s {
            warn!(page = label, secs, "Slow page load");
            Some(ThresholdBreach {
                severity: Severity::Warning,
                metric: "page_load",
                label: label.to_string(),
                value: secs,
                limit: t.page_load_warning_s,
            })
        } else {
            None
        }
    }

    /// Record a search timing. Searches have no alert threshold.
    pub fn track_search_time(&self, start: Instant, query: &str, result_count: usize) {
        self.track_search_time_at(start, query, result_count, Instant::now());
    }

    fn track_search_time_at(&self, start: Instant, query: &str, result_count: usize, now: Instant) {
        let secs = now.saturating_duration_since(start).as_secs_f64();
        self.inner
            .state
            .write()
            .unwrap()
            .searches
            .push(TimedSample { secs, at: now });
        info!(
            query,
            results = result_count,
            secs,
            "Search completed"
        );
    }

    /// Record an LLM response timing. A failed response also records an
    /// error sample.
    pub fn track_llm_response(&self, start: Instant, label: &str, success: bool) {
        self.track_llm_response_at(start, label, success, Instant::now());
    }

    fn track_llm_response_at(&self, start: Instant, label: &str, success: bool, now: Instant) {
        let secs = now.saturating_duration_since(start).as_secs_f64();
        {
            let mut state = self.inner.state.write().unwrap();
            state.llm_responses.push(TimedSample { secs, at: now });
            if !success {
                state.errors.push(ErrorSample {
                    kind: "llm_error",
                    at: now,
                });
            }
        }
        if success {
            info!(label, secs, "LLM response");
        } else {
            warn!(label, secs, "LLM response failed");
        }
    }

    /// Record an external API call. Failures also count as errors.
    pub fn track_api_call(&self, name: &str, success: bool, elapsed: Duration) {
        self.track_api_call_at(name, success, elapsed, Instant::now());
    }

    fn track_api_call_at(&self, name: &str, success: bool, elapsed: Duration, now: Instant) {
        let mut state = self.inner.state.write().unwrap();
        state.api_calls.push(ApiSample { success, at: now });
        if !success {
            state.errors.push(ErrorSample {
                kind: "api_error",
                at: now,
            });
            drop(state);
            warn!(api = name, secs = elapsed.as_secs_f64(), "API call failed");
        }
    }

    // -- cache efficiency ----------------------------------------------------

    /// Record one cross-cutting hit/miss observation for a pool.
    ///
    /// This bookkeeping is separate from the pool's own counters. Once a
    /// pool has at least ten observations, a hit rate strictly below the
    /// configured minimum raises a warning; exactly at the minimum is fine.
    pub fn track_cache_hit(&self, pool: &str, hit: bool) -> Option<ThresholdBreach> {
        let (hits, misses) = {
            let mut state = self.inner.state.write().unwrap();
            let counts = state.cache_counts.entry(pool.to_string()).or_default();
            if hit {
                counts.hits += 1;
            } else {
                counts.misses += 1;
            }
            (counts.hits, counts.misses)
        };

        let total = hits + misses;
        if total < CACHE_ALERT_MIN_OBSERVATIONS {
            return None;
        }
        let hit_rate = hits as f64 / total as f64 * 100.0;
        if hit_rate < self.inner.thresholds.cache_hit_minimum_pct {
            warn!(pool, hit_rate, "Low cache efficiency");
            return Some(ThresholdBreach {
                severity: Severity::Warning,
                metric: "cache_hit_rate",
                label: pool.to_string(),
                value: hit_rate,
                limit: self.inner.thresholds.cache_hit_minimum_pct,
            });
        }
        None
    }

    // -- memory --------------------------------------------------------------

    /// Sample process resident memory. Returns the reading in MB, or `None`
    /// when the platform does not expose RSS.
    ///
    /// A reading above the critical threshold triggers cleanup immediately;
    /// above the warning threshold it only raises a warning.
    pub fn track_memory_usage(&self) -> Option<f64> {
        let mb = rss::rss_mb()?;
        self.record_memory_at(mb, Instant::now());
        Some(mb)
    }

    fn record_memory_at(&self, mb: f64, now: Instant) -> Option<ThresholdBreach> {
        {
            let mut state = self.inner.state.write().unwrap();
            if state.memory.len() >= MEMORY_SAMPLES_MAX {
                state.memory.pop_front();
            }
            state.memory.push_back(MemorySample { mb, at: now });
        }

        let t = &self.inner.thresholds;
        if mb > t.memory_critical_mb {
            error!(memory_mb = mb, "Critical memory usage");
            self.run_cleanup_at(now);
            Some(ThresholdBreach {
                severity: Severity::Critical,
                metric: "memory",
                label: String::new(),
                value: mb,
                limit: t.memory_critical_mb,
            })
        } else if mb > t.memory_warning_mb {
            warn!(memory_mb = mb, "High memory usage");
            Some(ThresholdBreach {
                severity: Severity::Warning,
                metric: "memory",
                label: String::new(),
                value: mb,
                limit: t.memory_warning_mb,
            })
        } else {
            None
        }
    }

    // -- cleanup cycle ---------------------------------------------------------

    /// Run cleanup now: registry sweep, collaborator session purge, and
    /// re-arm the interval clock.
    pub fn trigger_cleanup(&self) {
        self.run_cleanup_at(Instant::now());
    }

    fn run_cleanup_at(&self, now: Instant) {
        info!("Triggering cache cleanup");
        let cleanup = self.inner.cleanup.read().unwrap().clone();
        if let Some(hook) = cleanup {
            hook();
        }
        let purge = self.inner.session_purge.read().unwrap().clone();
        if let Some(hook) = purge {
            hook(SESSION_PURGE_CUTOFF);
        }
        self.inner.state.write().unwrap().last_cleanup = now;
    }

    /// Opportunistic check: run cleanup if the interval has elapsed since
    /// the last run. Returns whether cleanup ran.
    pub fn maybe_cleanup(&self) -> bool {
        self.maybe_cleanup_at(Instant::now())
    }

    fn maybe_cleanup_at(&self, now: Instant) -> bool {
        if self.cleanup_due_at(now) {
            self.run_cleanup_at(now);
            true
        } else {
            false
        }
    }

    fn cleanup_due_at(&self, now: Instant) -> bool {
        let last = self.inner.state.read().unwrap().last_cleanup;
        now.saturating_duration_since(last) >= self.inner.cleanup_interval
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.inner.cleanup_interval
    }

    // -- summary ------------------------------------------------------------

    /// Summary over the last ten minutes, taking a fresh memory reading
    /// first so `current_memory_mb` is up to date.
    pub fn summary(&self) -> PerformanceSummary {
        let _ = self.track_memory_usage();
        self.summary_at(Instant::now())
    }

    fn summary_at(&self, now: Instant) -> PerformanceSummary {
        let state = self.inner.state.read().unwrap();
        let in_window =
            |at: Instant| now.saturating_duration_since(at) < SUMMARY_WINDOW;

        let avg = |samples: &[TimedSample]| {
            let recent: Vec<f64> = samples
                .iter()
                .filter(|s| in_window(s.at))
                .map(|s| s.secs)
                .collect();
            if recent.is_empty() {
                None
            } else {
                Some(recent.iter().sum::<f64>() / recent.len() as f64)
            }
        };

        let cache_efficiency = state
            .cache_counts
            .iter()
            .filter_map(|(pool, c)| {
                let total = c.hits + c.misses;
                if total == 0 {
                    return None;
                }
                Some((pool.clone(), c.hits as f64 / total as f64 * 100.0))
            })
            .collect();

        let recent_api: Vec<&ApiSample> =
            state.api_calls.iter().filter(|s| in_window(s.at)).collect();
        let api_success_rate = if recent_api.is_empty() {
            None
        } else {
            let ok = recent_api.iter().filter(|s| s.success).count();
            Some(ok as f64 / recent_api.len() as f64 * 100.0)
        };

        let mut recent_errors = 0;
        let mut recent_errors_by_kind = BTreeMap::new();
        for sample in state.errors.iter().filter(|e| in_window(e.at)) {
            recent_errors += 1;
            *recent_errors_by_kind.entry(sample.kind).or_insert(0) += 1;
        }

        PerformanceSummary {
            avg_page_load_s: avg(&state.page_loads),
            avg_search_time_s: avg(&state.searches),
            cache_efficiency,
            current_memory_mb: state.memory.back().map(|s| s.mb),
            recent_errors,
            recent_errors_by_kind,
            api_success_rate,
        }
    }

    /// Reset all samples and counters. Cleanup hooks stay attached.
    pub fn reset(&self) {
        *self.inner.state.write().unwrap() = MonitorState::new();
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(Thresholds::default(), Duration::from_secs(1800))
    }
}
