//! # Metrics Types
//!
//! Per-endpoint statistics returned by the integration service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final result of a logical request, used when recording metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Failure,
}

impl RequestOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::Failure => "failure",
        }
    }
}

/// Running statistics of one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMetrics {
    /// Every recorded request, cache hits included
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Mean duration of successful requests in milliseconds
    pub average_response_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request_time: Option<DateTime<Utc>>,
    /// Failed share of all requests, as a percentage (0–100)
    pub error_rate: f64,
    /// Raised on each cache hit by `(1 - rate) / total_requests`; misses leave it (0.0–1.0)
    pub cache_hit_rate: f64,
    pub rate_limit_hits: u64,
}
