//! Background reclamation of idle rate limit entries.
//!
//! The reclaimer sweeps the entry store on a fixed interval and drops every
//! bucket whose idle expiry has passed. It stops once its cancellation token
//! fires; a sweep already in progress finishes first.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::limiter::RateLimiter;

/// Shortest interval the reclaimer will tick at.
pub const MIN_GC_INTERVAL: Duration = Duration::from_millis(1);

impl RateLimiter {
    /// Sweep idle entries every `period` until `cancel` fires.
    pub async fn run_gc(&self, period: Duration, cancel: CancellationToken) {
        let period = if period < MIN_GC_INTERVAL {
            warn!(
                requested_ms = period.as_millis() as u64,
                "GC interval too small, using minimum"
            );
            MIN_GC_INTERVAL
        } else {
            period
        };

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_ms = period.as_millis() as u64, "Rate limit GC started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Rate limit GC shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        debug!(
                            removed,
                            remaining = self.active_entries(),
                            "Reclaimed idle rate limit entries"
                        );
                    }
                }
            }
        }
    }

    /// Spawn the reclaimer on the current tokio runtime.
    pub fn spawn_gc(self: &Arc<Self>, period: Duration) -> GcHandle {
        let cancel = CancellationToken::new();
        let limiter = Arc::clone(self);
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            limiter.run_gc(period, token).await;
        });

        GcHandle {
            cancel,
            task: Some(task),
        }
    }
}

/// Handle to a spawned reclaimer.
///
/// Dropping the handle cancels the reclaimer without waiting for it.
#[derive(Debug)]
pub struct GcHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl GcHandle {
    /// Token that stops the reclaimer when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the reclaimer task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Cancel the reclaimer and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Rate limit GC task failed");
            }
        }
    }
}

impl Drop for GcHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn limiter() -> Arc<RateLimiter> {
        let limiter = RateLimiter::new();
        limiter
            .register_context("foo", Duration::from_secs(20), 10.0, 3)
            .unwrap();
        Arc::new(limiter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_reclaims_idle_entries() {
        let limiter = limiter();
        let handle = limiter.spawn_gc(Duration::from_secs(10));

        assert!(limiter.is_allowed("foo", "IP_0"));
        assert_eq!(limiter.active_entries(), 1);

        // Auto-advance runs the ticks at 10s and 20s
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(limiter.active_entries(), 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_keeps_recent_entries() {
        let limiter = limiter();
        let handle = limiter.spawn_gc(Duration::from_secs(10));

        for _ in 0..4 {
            limiter.is_allowed("foo", "IP_0");
            tokio::time::sleep(Duration::from_secs(15)).await;
        }
        assert_eq!(limiter.active_entries(), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_gc_stops_on_cancel() {
        let limiter = limiter();
        let cancel = CancellationToken::new();

        let task = {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.run_gc(Duration::from_secs(1), cancel).await })
        };

        advance(Duration::from_secs(3)).await;
        cancel.cancel();
        task.await.unwrap();

        // No sweep happens after cancellation
        assert!(limiter.is_allowed("foo", "IP_0"));
        advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.active_entries(), 1);
    }

    #[tokio::test]
    async fn test_run_gc_returns_when_already_cancelled() {
        let limiter = limiter();
        let cancel = CancellationToken::new();
        cancel.cancel();

        limiter.run_gc(Duration::from_secs(3600), cancel).await;
    }

    #[tokio::test]
    async fn test_zero_interval_is_clamped() {
        let limiter = limiter();
        let handle = limiter.spawn_gc(Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_gc() {
        let limiter = limiter();
        let handle = limiter.spawn_gc(Duration::from_millis(5));
        let token = handle.cancellation_token();
        assert_eq!(Arc::strong_count(&limiter), 2);

        drop(handle);
        assert!(token.is_cancelled());

        // The task releases its clone of the limiter once it exits
        for _ in 0..100 {
            if Arc::strong_count(&limiter) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(Arc::strong_count(&limiter), 1);
    }
}
