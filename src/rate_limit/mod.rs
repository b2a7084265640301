//! Fixed-window rate limiting per endpoint.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::IntegrationError;
use crate::registry::RateLimitConfig;

#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl WindowState {
    fn elapsed(&self, now: Instant) -> bool {
        now.duration_since(self.window_start) >= self.window
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Window exhausted; it resets after `retry_after`.
    Limited { retry_after: Duration },
}

/// Per-endpoint fixed-window counters.
///
/// Each check-and-increment runs under the endpoint's map entry lock and
/// never across an await point. Queued callers re-poll independently, so
/// wake order among waiters is not strictly FIFO.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<String, WindowState>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking admission check that counts the call when admitted.
    pub fn try_acquire(&self, endpoint_id: &str, config: &RateLimitConfig) -> Admission {
        let now = Instant::now();
        let window = config.window_duration();
        let mut state = self
            .windows
            .entry(endpoint_id.to_string())
            .or_insert_with(|| WindowState {
                count: 0,
                window_start: now,
                window,
            });

        state.window = window;
        if state.elapsed(now) {
            state.count = 0;
            state.window_start = now;
        }

        if state.count < config.requests {
            state.count += 1;
            Admission::Admitted
        } else {
            let retry_after = window.saturating_sub(now.duration_since(state.window_start));
            Admission::Limited { retry_after }
        }
    }

    /// Admit a call to `endpoint_id`, waiting if the endpoint queues callers.
    ///
    /// Without a config every call is admitted. An endpoint queues only when
    /// `queue` is set together with a non-zero `throttleDelay`; queued callers
    /// sleep that delay between checks and waiting is bounded only by the
    /// caller.
    ///
    /// # Errors
    ///
    /// `RateLimitExceeded` when the window is exhausted and the endpoint does
    /// not queue, or when the config admits no requests at all.
    pub async fn admit(
        &self,
        endpoint_id: &str,
        config: Option<&RateLimitConfig>,
    ) -> Result<(), IntegrationError> {
        let Some(config) = config else {
            return Ok(());
        };
        let throttle = config
            .throttle_duration()
            .filter(|delay| config.queue && config.requests > 0 && !delay.is_zero());

        loop {
            let retry_after = match self.try_acquire(endpoint_id, config) {
                Admission::Admitted => return Ok(()),
                Admission::Limited { retry_after } => retry_after,
            };

            let Some(wait) = throttle else {
                tracing::debug!(
                    endpoint_id,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limit exceeded"
                );
                return Err(IntegrationError::RateLimitExceeded {
                    endpoint: endpoint_id.to_string(),
                    retry_after_ms: retry_after.as_millis() as u64,
                });
            };

            tracing::trace!(
                endpoint_id,
                wait_ms = wait.as_millis() as u64,
                "Rate limited, queueing caller"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Calls admitted in the current window, if the endpoint has state.
    pub fn current_count(&self, endpoint_id: &str) -> Option<u32> {
        self.windows.get(endpoint_id).map(|state| state.count)
    }

    pub fn reset(&self, endpoint_id: &str) {
        self.windows.remove(endpoint_id);
    }

    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Drop states whose window has already elapsed. Returns the number
    /// removed.
    pub fn sweep_elapsed(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, state| !state.elapsed(now));
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
