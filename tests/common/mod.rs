//! Shared test utilities for Conduit integration tests.
//!
//! Provides endpoint builders and a service wired to the real reqwest
//! transport so tests can run against wiremock servers.

#![allow(dead_code)]

use conduit::registry::{
    AuthConfig, BackoffStrategy, CacheConfig, CacheStorage, Endpoint, RateLimitConfig, RetryPolicy,
};
use conduit::service::IntegrationService;
use conduit::transport::ReqwestTransport;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Service
// =============================================================================

/// Service over a real reqwest client.
pub fn make_service() -> IntegrationService {
    let transport = ReqwestTransport::new("conduit-test", Duration::from_secs(2)).unwrap();
    IntegrationService::builder(Arc::new(transport)).build()
}

// =============================================================================
// Endpoint Builders
// =============================================================================

/// GET endpoint pointing at `path` on `base_url`.
pub fn make_endpoint(id: &str, base_url: &str, path: &str) -> Endpoint {
    Endpoint::new(id, id, format!("{}{}", base_url, path))
}

pub fn with_cache(mut endpoint: Endpoint, ttl_ms: u64) -> Endpoint {
    endpoint.cache = Some(CacheConfig {
        enabled: true,
        ttl: ttl_ms,
        strategy: CacheStorage::Memory,
    });
    endpoint
}

/// Callers queue only when `throttle_ms` is given.
pub fn with_rate_limit(
    mut endpoint: Endpoint,
    requests: u32,
    window_ms: u64,
    throttle_ms: Option<u64>,
) -> Endpoint {
    endpoint.rate_limit = Some(RateLimitConfig {
        requests,
        window: window_ms,
        queue: throttle_ms.is_some(),
        throttle_delay: throttle_ms,
    });
    endpoint
}

/// Fixed short delays keep retry tests fast.
pub fn with_retry(mut endpoint: Endpoint, max_attempts: u32, codes: &[u16]) -> Endpoint {
    endpoint.retry_policy = Some(RetryPolicy {
        max_attempts,
        backoff_strategy: BackoffStrategy::Fixed,
        base_delay: 10,
        max_delay: None,
        retryable_status_codes: codes.to_vec(),
    });
    endpoint
}

pub fn with_auth(mut endpoint: Endpoint, auth: AuthConfig) -> Endpoint {
    endpoint.auth = auth;
    endpoint
}
