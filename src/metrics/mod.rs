//! # Metrics Collection Module
//!
//! Per-endpoint request statistics, mirrored to the `metrics` facade for
//! Prometheus export.
//!
//! ## Metrics Emitted
//!
//! **Counters:**
//! - `conduit_requests_total{endpoint, outcome}` - Recorded requests
//! - `conduit_cache_hits_total{endpoint}` - Requests served from cache
//! - `conduit_rate_limit_hits_total{endpoint}` - Rate limit rejections
//!
//! **Histograms:**
//! - `conduit_request_duration_seconds{endpoint}` - Request duration

pub mod types;

pub use types::*;

use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;

/// Owns the statistics of every known endpoint.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    endpoints: DashMap<String, EndpointMetrics>,
    /// Thread-safe cache for sanitized Prometheus labels
    label_cache: DashMap<String, String>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one logical request.
    ///
    /// Cache hits carry no outcome, so they move only the totals, timestamp
    /// and hit rate. The hit rate moves on hits only, as
    /// `rate += (1 - rate) / total`. The average duration is taken over
    /// successful requests only.
    pub fn record(
        &self,
        endpoint_id: &str,
        elapsed: Duration,
        cache_hit: bool,
        outcome: Option<RequestOutcome>,
    ) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        {
            let mut stats = self.endpoints.entry(endpoint_id.to_string()).or_default();
            stats.total_requests += 1;
            stats.last_request_time = Some(Utc::now());

            let total = stats.total_requests as f64;
            if cache_hit {
                stats.cache_hit_rate += (1.0 - stats.cache_hit_rate) / total;
            }

            match outcome {
                Some(RequestOutcome::Success) => {
                    stats.successful_requests += 1;
                    let n = stats.successful_requests as f64;
                    stats.average_response_time =
                        (stats.average_response_time * (n - 1.0) + elapsed_ms) / n;
                }
                Some(RequestOutcome::Failure) => stats.failed_requests += 1,
                None => {}
            }

            stats.error_rate = stats.failed_requests as f64 / total * 100.0;
        }

        let label = self.sanitize_label(endpoint_id);
        let outcome_label = outcome.map(|o| o.as_label()).unwrap_or("unknown");
        metrics::counter!(
            "conduit_requests_total",
            "endpoint" => label.clone(),
            "outcome" => outcome_label
        )
        .increment(1);
        metrics::histogram!("conduit_request_duration_seconds", "endpoint" => label.clone())
            .record(elapsed.as_secs_f64());
        if cache_hit {
            metrics::counter!("conduit_cache_hits_total", "endpoint" => label).increment(1);
        }
    }

    pub fn record_rate_limit_hit(&self, endpoint_id: &str) {
        self.endpoints
            .entry(endpoint_id.to_string())
            .or_default()
            .rate_limit_hits += 1;

        let label = self.sanitize_label(endpoint_id);
        metrics::counter!("conduit_rate_limit_hits_total", "endpoint" => label).increment(1);
    }

    /// Start `endpoint_id` from zeroed statistics.
    pub fn reset(&self, endpoint_id: &str) {
        self.endpoints
            .insert(endpoint_id.to_string(), EndpointMetrics::default());
    }

    pub fn remove(&self, endpoint_id: &str) {
        self.endpoints.remove(endpoint_id);
    }

    pub fn clear(&self) {
        self.endpoints.clear();
    }

    pub fn get(&self, endpoint_id: &str) -> Option<EndpointMetrics> {
        self.endpoints.get(endpoint_id).map(|m| m.clone())
    }

    /// Snapshot of every endpoint's statistics, sorted by id.
    pub fn all(&self) -> Vec<(String, EndpointMetrics)> {
        let mut all: Vec<_> = self
            .endpoints
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Get sanitized Prometheus label (cached for performance).
    ///
    /// Prometheus label values are unrestricted, but endpoint ids are also
    /// used in dashboards that expect `[a-zA-Z_][a-zA-Z0-9_]*`, so invalid
    /// characters become underscores.
    pub fn sanitize_label(&self, label: &str) -> String {
        if let Some(cached) = self.label_cache.get(label) {
            return cached.clone();
        }

        let mut sanitized = label
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>();

        if sanitized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            sanitized.insert(0, '_');
        }

        self.label_cache.insert(label.to_string(), sanitized.clone());
        sanitized
    }
}

/// Initialize the Prometheus exporter with request duration buckets.
///
/// Buckets (seconds): [0.01, 0.05, 0.1, 0.25, 0.5, 1, 2.5, 5, 10, 30].
///
/// Returns a PrometheusHandle that can be used to render metrics.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let duration_buckets = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("conduit_request_duration_seconds".to_string()),
            duration_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}
