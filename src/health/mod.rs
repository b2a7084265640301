//! Endpoint health classification.
//!
//! A health check is a forced-fresh request through the normal request path;
//! this module only turns its outcome into a [`HealthReport`].


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::IntegrationError;
use crate::executor::ResponseEnvelope;

/// Successful responses at or above this latency are reported as degraded.
pub const DEGRADED_THRESHOLD: Duration = Duration::from_millis(1000);

/// Health classification of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub endpoint_id: String,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Classify the outcome of a health request that took `elapsed`.
    pub fn from_outcome(
        endpoint_id: &str,
        outcome: &Result<ResponseEnvelope, IntegrationError>,
        elapsed: Duration,
    ) -> Self {
        let (status, status_code, error) = match outcome {
            Ok(envelope) if envelope.is_success() => {
                let status = if elapsed < DEGRADED_THRESHOLD {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                };
                (status, Some(envelope.status), None)
            }
            Ok(envelope) => (
                HealthStatus::Unhealthy,
                Some(envelope.status),
                Some(format!("HTTP {}: {}", envelope.status, envelope.status_text)),
            ),
            Err(err) => (HealthStatus::Unhealthy, err.status_code(), Some(err.to_string())),
        };

        Self {
            endpoint_id: endpoint_id.to_string(),
            status,
            response_time_ms: elapsed.as_millis() as u64,
            status_code,
            error,
            checked_at: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
