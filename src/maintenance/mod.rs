//! Background sweeps of expired cache entries and idle rate limit windows.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cache::ResponseCache;
use crate::config::MaintenanceConfig;
use crate::rate_limit::RateLimiter;

/// Periodic cleanup of a service's cache and limiter state.
///
/// Each sweep only removes entries that are already invalid by their own
/// expiry or window check, so it can run alongside live requests.
#[derive(Debug, Clone)]
pub struct Maintenance {
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    cache_sweep_interval: Duration,
    rate_limit_sweep_interval: Duration,
}

impl Maintenance {
    pub fn new(
        cache: Arc<ResponseCache>,
        limiter: Arc<RateLimiter>,
        config: &MaintenanceConfig,
    ) -> Self {
        Self {
            cache,
            limiter,
            cache_sweep_interval: Duration::from_secs(config.cache_sweep_seconds.max(1)),
            rate_limit_sweep_interval: Duration::from_secs(config.rate_limit_sweep_seconds.max(1)),
        }
    }

    /// Remove expired cache entries. Returns the number removed.
    pub fn sweep_cache(&self) -> usize {
        let removed = self.cache.sweep_expired();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.cache.len(), "Cache sweep completed");
        }
        removed
    }

    /// Remove limiter states whose window has elapsed.
    pub fn sweep_rate_limits(&self) -> usize {
        let removed = self.limiter.sweep_elapsed();
        if removed > 0 {
            tracing::debug!(removed, "Rate limit sweep completed");
        }
        removed
    }

    /// Start the sweep loop as a background task.
    ///
    /// The loop exits when `cancel_token` is cancelled.
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            // interval() yields immediately; skip that first tick so the
            // initial sweep happens one period after startup
            let start = tokio::time::Instant::now();
            let mut cache_interval =
                tokio::time::interval_at(start + self.cache_sweep_interval, self.cache_sweep_interval);
            cache_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut limiter_interval = tokio::time::interval_at(
                start + self.rate_limit_sweep_interval,
                self.rate_limit_sweep_interval,
            );
            limiter_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                cache_sweep_seconds = self.cache_sweep_interval.as_secs(),
                rate_limit_sweep_seconds = self.rate_limit_sweep_interval.as_secs(),
                "Maintenance started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Maintenance shutting down");
                        break;
                    }
                    _ = cache_interval.tick() => {
                        self.sweep_cache();
                    }
                    _ = limiter_interval.tick() => {
                        self.sweep_rate_limits();
                    }
                }
            }
        })
    }
}
