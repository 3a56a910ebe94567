//! Background cleanup ticker.
//!
//! Runs [`PerformanceMonitor::trigger_cleanup`] on a fixed interval in a
//! dedicated tokio task. Chosen over opportunistic per-request checks so the
//! worst-case staleness of expired entries is bounded by the interval even
//! when the process sits idle.

use tokio::sync::watch;
use tracing::info;

use crate::monitor::PerformanceMonitor;

/// Spawn the periodic cleanup task.
///
/// Ticks at the monitor's configured cleanup interval and exits when
/// `shutdown_rx` flips to `true`. Returns the task handle so callers can
/// await or abort it on shutdown.
pub fn spawn_cleanup_task(
    monitor: PerformanceMonitor,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(monitor.cleanup_interval());
        interval.tick().await; // skip the immediate first tick

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    monitor.trigger_cleanup();
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Cleanup task shutting down");
                        return;
                    }
                }
            }
        }
    })
}
