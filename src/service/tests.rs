use super::*;
use crate::health::HealthStatus;
use crate::registry::{CacheConfig, CacheStorage, RateLimitConfig};
use crate::transport::{TransportError, TransportRequest, TransportResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Test transport
// ============================================================================

/// Answers every request with a fixed status per path, optionally after a
/// delay, and records the request URLs.
#[derive(Default)]
struct MockTransport {
    statuses: Mutex<HashMap<String, u16>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    fn set_status(&self, path: &str, status: u16) {
        self.statuses
            .lock()
            .unwrap()
            .insert(path.to_string(), status);
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(request.url.path())
            .copied()
            .unwrap_or(200);
        Ok(TransportResponse {
            status,
            status_text: if status == 200 { "OK" } else { "Error" }.to_string(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: format!(r#"{{"path": "{}"}}"#, request.url.path()).into_bytes(),
        })
    }
}

fn service(transport: Arc<MockTransport>) -> IntegrationService {
    IntegrationService::builder(transport).build()
}

fn endpoint(id: &str) -> Endpoint {
    Endpoint::new(id, id, format!("https://api.example.com/{}", id))
}

fn cached_endpoint(id: &str, ttl: u64) -> Endpoint {
    let mut endpoint = endpoint(id);
    endpoint.cache = Some(CacheConfig {
        enabled: true,
        ttl,
        strategy: CacheStorage::Memory,
    });
    endpoint
}

// ============================================================================
// Endpoint management
// ============================================================================

#[test]
fn test_register_duplicate_rejected() {
    let svc = service(MockTransport::new());
    svc.register_endpoint(endpoint("users")).unwrap();

    let err = svc.register_endpoint(endpoint("users")).unwrap_err();
    assert_eq!(err, IntegrationError::DuplicateEndpoint("users".to_string()));
    assert_eq!(svc.list_endpoints().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_register_rejects_zero_request_rate_limit() {
    let svc = service(MockTransport::new());
    let mut limited = endpoint("search");
    limited.rate_limit = Some(RateLimitConfig {
        requests: 0,
        window: 1_000,
        queue: true,
        throttle_delay: Some(100),
    });

    let err = svc.register_endpoint(limited).unwrap_err();
    assert!(matches!(
        err,
        IntegrationError::InvalidEndpoint { ref endpoint, ref field, .. }
            if endpoint == "search" && field == "rateLimit.requests"
    ));
    assert_eq!(
        svc.request("search", RequestOptions::new()).await.unwrap_err(),
        IntegrationError::NotFound("search".to_string())
    );
    assert!(svc.get_metrics("search").is_none());
}

#[test]
fn test_update_to_zero_request_rate_limit_rejected() {
    let svc = service(MockTransport::new());
    svc.register_endpoint(endpoint("search")).unwrap();

    let err = svc
        .update_endpoint(
            "search",
            EndpointUpdate {
                rate_limit: Some(RateLimitConfig {
                    requests: 0,
                    window: 1_000,
                    queue: false,
                    throttle_delay: None,
                }),
                ..EndpointUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, IntegrationError::InvalidEndpoint { .. }));
    assert!(svc.get_endpoint("search").unwrap().rate_limit.is_none());
}

#[tokio::test]
async fn test_separator_in_id_rejected_so_cache_clears_stay_scoped() {
    let transport = MockTransport::new();
    let svc = IntegrationService::builder(transport.clone())
        .cache_key_strategy(CacheKeyStrategy::Request)
        .build();
    svc.register_endpoint(cached_endpoint("a", 60_000)).unwrap();

    let err = svc.register_endpoint(cached_endpoint("a#b", 60_000)).unwrap_err();
    assert!(matches!(
        err,
        IntegrationError::InvalidEndpoint { ref field, .. } if field == "id"
    ));

    svc.register_endpoint(cached_endpoint("a-b", 60_000)).unwrap();
    let options = RequestOptions::new().query("page", "2");
    svc.request("a", options.clone()).await.unwrap();
    svc.request("a-b", options.clone()).await.unwrap();

    svc.clear_cache(Some("a"));
    assert!(!svc.request("a", options.clone()).await.unwrap().cached);
    assert!(svc.request("a-b", options).await.unwrap().cached);
}

#[test]
fn test_register_starts_with_zeroed_metrics() {
    let svc = service(MockTransport::new());
    svc.register_endpoint(endpoint("users")).unwrap();
    assert_eq!(svc.get_metrics("users"), Some(EndpointMetrics::default()));
}

#[tokio::test]
async fn test_unregister_cascades_to_cache_and_metrics() {
    let transport = MockTransport::new();
    let svc = service(transport.clone());
    svc.register_endpoint(cached_endpoint("users", 60_000)).unwrap();

    svc.request("users", RequestOptions::new()).await.unwrap();
    assert_eq!(svc.get_metrics("users").unwrap().total_requests, 1);

    svc.unregister_endpoint("users").unwrap();
    assert!(svc.get_endpoint("users").is_none());
    assert!(svc.get_metrics("users").is_none());

    svc.register_endpoint(cached_endpoint("users", 60_000)).unwrap();
    assert_eq!(svc.get_metrics("users"), Some(EndpointMetrics::default()));

    let response = svc.request("users", RequestOptions::new()).await.unwrap();
    assert!(!response.cached);
    assert_eq!(transport.request_count(), 2);
}

#[test]
fn test_unregister_unknown_endpoint() {
    let svc = service(MockTransport::new());
    assert_eq!(
        svc.unregister_endpoint("ghost"),
        Err(IntegrationError::NotFound("ghost".to_string()))
    );
}

#[tokio::test]
async fn test_update_endpoint_invalidates_cache() {
    let transport = MockTransport::new();
    let svc = service(transport.clone());
    svc.register_endpoint(cached_endpoint("users", 60_000)).unwrap();

    svc.request("users", RequestOptions::new()).await.unwrap();
    let updated = svc
        .update_endpoint(
            "users",
            EndpointUpdate {
                timeout: Some(5_000),
                ..EndpointUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(updated.timeout, 5_000);
    assert_eq!(updated.name, "users");

    let response = svc.request("users", RequestOptions::new()).await.unwrap();
    assert!(!response.cached);
    assert_eq!(transport.request_count(), 2);
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test]
async fn test_request_unknown_endpoint() {
    let svc = service(MockTransport::new());
    let err = svc.request("ghost", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err, IntegrationError::NotFound("ghost".to_string()));
}

#[tokio::test]
async fn test_second_request_served_from_cache() {
    let transport = MockTransport::new();
    let svc = service(transport.clone());
    svc.register_endpoint(cached_endpoint("users", 60_000)).unwrap();

    let first = svc.request("users", RequestOptions::new()).await.unwrap();
    let second = svc.request("users", RequestOptions::new()).await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.data, second.data);
    assert_eq!(transport.request_count(), 1);

    let metrics = svc.get_metrics("users").unwrap();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.successful_requests, 1);
    assert_eq!(metrics.failed_requests, 0);
    assert!((metrics.cache_hit_rate - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_cache_hit_leaves_average_and_counts_alone() {
    let transport = MockTransport::with_delay(Duration::from_millis(40));
    let svc = service(transport);
    svc.register_endpoint(cached_endpoint("users", 60_000)).unwrap();

    svc.request("users", RequestOptions::new()).await.unwrap();
    let after_miss = svc.get_metrics("users").unwrap();
    svc.request("users", RequestOptions::new()).await.unwrap();
    svc.request("users", RequestOptions::new()).await.unwrap();

    let metrics = svc.get_metrics("users").unwrap();
    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.successful_requests, 1);
    assert_eq!(metrics.average_response_time, after_miss.average_response_time);
    assert_eq!(metrics.error_rate, 0.0);
    // 0 -> 1/2 -> 1/2 + (1 - 1/2) / 3
    assert!((metrics.cache_hit_rate - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_force_refresh_bypasses_cache_read() {
    let transport = MockTransport::new();
    let svc = service(transport.clone());
    svc.register_endpoint(cached_endpoint("users", 60_000)).unwrap();

    svc.request("users", RequestOptions::new()).await.unwrap();
    let refreshed = svc
        .request("users", RequestOptions::new().force_refresh())
        .await
        .unwrap();
    assert!(!refreshed.cached);
    assert_eq!(transport.request_count(), 2);

    let cached = svc.request("users", RequestOptions::new()).await.unwrap();
    assert!(cached.cached);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cache_entry_expires_after_ttl() {
    let transport = MockTransport::new();
    let svc = service(transport.clone());
    svc.register_endpoint(cached_endpoint("users", 1_000)).unwrap();

    svc.request("users", RequestOptions::new()).await.unwrap();
    tokio::time::advance(Duration::from_millis(1_001)).await;

    let response = svc.request("users", RequestOptions::new()).await.unwrap();
    assert!(!response.cached);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_failed_response_is_not_cached() {
    let transport = MockTransport::new();
    transport.set_status("/users", 500);
    let svc = service(transport.clone());
    svc.register_endpoint(cached_endpoint("users", 60_000)).unwrap();

    let err = svc.request("users", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));

    transport.set_status("/users", 200);
    let response = svc.request("users", RequestOptions::new()).await.unwrap();
    assert!(!response.cached);

    let metrics = svc.get_metrics("users").unwrap();
    assert_eq!(metrics.failed_requests, 1);
    assert!((metrics.error_rate - 50.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_rate_limit_rejection_counted() {
    let svc = service(MockTransport::new());
    let mut limited = endpoint("search");
    limited.rate_limit = Some(RateLimitConfig {
        requests: 1,
        window: 60_000,
        queue: false,
        throttle_delay: None,
    });
    svc.register_endpoint(limited).unwrap();

    svc.request("search", RequestOptions::new()).await.unwrap();
    let err = svc
        .request("search", RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, IntegrationError::RateLimitExceeded { .. }));

    let metrics = svc.get_metrics("search").unwrap();
    assert_eq!(metrics.rate_limit_hits, 1);
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.failed_requests, 1);
}

// ============================================================================
// Batch
// ============================================================================

#[tokio::test]
async fn test_batch_partial_failure() {
    let svc = service(MockTransport::new());
    for id in ["a", "b", "c"] {
        svc.register_endpoint(endpoint(id)).unwrap();
    }

    let items = ["a", "b", "c", "missing-1", "missing-2"]
        .into_iter()
        .map(BatchItem::new)
        .collect();
    let result = svc.batch_request(items).await;

    assert_eq!(
        result.summary,
        BatchSummary {
            attempted: 5,
            succeeded: 3,
            failed: 2
        }
    );
    assert_eq!(
        result.responses.keys().cloned().collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );
    assert!(result
        .failures
        .iter()
        .all(|f| matches!(f.error, IntegrationError::NotFound(_))));
}

#[tokio::test]
async fn test_batch_empty() {
    let svc = service(MockTransport::new());
    let result = svc.batch_request(Vec::new()).await;
    assert_eq!(result.summary, BatchSummary::default());
    assert!(result.responses.is_empty());
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_health_slow_response_is_degraded() {
    let svc = service(MockTransport::with_delay(Duration::from_millis(1_500)));
    svc.register_endpoint(endpoint("slow")).unwrap();

    let report = svc.health_check("slow").await.unwrap();
    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(report.response_time_ms >= 1_500);
}

#[tokio::test]
async fn test_health_check_all_reports_each_endpoint() {
    let transport = MockTransport::new();
    transport.set_status("/down", 503);
    let svc = service(transport);
    svc.register_endpoint(endpoint("up")).unwrap();
    svc.register_endpoint(endpoint("down")).unwrap();

    let reports = svc.health_check_all().await;
    let statuses: Vec<(&str, HealthStatus)> = reports
        .iter()
        .map(|r| (r.endpoint_id.as_str(), r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![("down", HealthStatus::Unhealthy), ("up", HealthStatus::Healthy)]
    );
}

#[tokio::test]
async fn test_health_check_unknown_endpoint() {
    let svc = service(MockTransport::new());
    assert!(matches!(
        svc.health_check("ghost").await,
        Err(IntegrationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_health_check_ignores_cache() {
    let transport = MockTransport::new();
    let svc = service(transport.clone());
    svc.register_endpoint(cached_endpoint("users", 60_000)).unwrap();

    svc.request("users", RequestOptions::new()).await.unwrap();
    svc.health_check("users").await.unwrap();
    assert_eq!(transport.request_count(), 2);
}

// ============================================================================
// Cache management and configuration
// ============================================================================

#[tokio::test]
async fn test_clear_cache_for_one_endpoint() {
    let transport = MockTransport::new();
    let svc = service(transport.clone());
    svc.register_endpoint(cached_endpoint("a", 60_000)).unwrap();
    svc.register_endpoint(cached_endpoint("b", 60_000)).unwrap();

    svc.request("a", RequestOptions::new()).await.unwrap();
    svc.request("b", RequestOptions::new()).await.unwrap();
    svc.clear_cache(Some("a"));

    assert!(!svc.request("a", RequestOptions::new()).await.unwrap().cached);
    assert!(svc.request("b", RequestOptions::new()).await.unwrap().cached);
}

#[test]
fn test_export_import_round_trip() {
    let source = service(MockTransport::new());
    source.register_endpoint(cached_endpoint("a", 30_000)).unwrap();
    source.register_endpoint(endpoint("b")).unwrap();
    let exported = source.export_configuration().unwrap();

    let target = service(MockTransport::new());
    target.register_endpoint(endpoint("stale")).unwrap();
    assert_eq!(target.import_configuration(&exported).unwrap(), 2);

    assert_eq!(target.list_endpoints(), source.list_endpoints());
    assert!(target.get_endpoint("stale").is_none());
}

#[test]
fn test_malformed_import_leaves_registry_untouched() {
    let svc = service(MockTransport::new());
    svc.register_endpoint(endpoint("keep")).unwrap();

    let err = svc.import_configuration("{ not json").unwrap_err();
    assert!(matches!(err, IntegrationError::Import(_)));
    assert!(svc.get_endpoint("keep").is_some());
}

#[test]
fn test_import_with_invalid_endpoint_leaves_registry_untouched() {
    let svc = service(MockTransport::new());
    svc.register_endpoint(endpoint("keep")).unwrap();

    let mut limited = endpoint("b");
    limited.rate_limit = Some(RateLimitConfig {
        requests: 0,
        window: 1_000,
        queue: true,
        throttle_delay: Some(50),
    });
    let document = ConfigurationDocument {
        endpoints: vec![endpoint("a"), limited],
        exported_at: None,
    };
    let json = serde_json::to_string(&document).unwrap();

    let err = svc.import_configuration(&json).unwrap_err();
    assert!(matches!(err, IntegrationError::Import(ref message) if message.contains("rateLimit.requests")));
    assert_eq!(svc.list_endpoints().len(), 1);
    assert!(svc.get_endpoint("keep").is_some());
}

#[test]
fn test_import_duplicate_ids_keeps_partial_state() {
    let svc = service(MockTransport::new());
    let document = ConfigurationDocument {
        endpoints: vec![endpoint("a"), endpoint("a")],
        exported_at: None,
    };
    let json = serde_json::to_string(&document).unwrap();

    assert!(matches!(
        svc.import_configuration(&json),
        Err(IntegrationError::Import(_))
    ));
    assert_eq!(svc.list_endpoints().len(), 1);
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_subscribers_receive_lifecycle_events() {
    let svc = service(MockTransport::new());
    let mut events = svc.subscribe();

    svc.register_endpoint(cached_endpoint("users", 60_000)).unwrap();
    svc.request("users", RequestOptions::new()).await.unwrap();
    svc.request("users", RequestOptions::new()).await.unwrap();
    svc.unregister_endpoint("users").unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert_eq!(
        received[0],
        IntegrationEvent::EndpointRegistered {
            endpoint_id: "users".to_string()
        }
    );
    assert!(matches!(
        received[1],
        IntegrationEvent::RequestSucceeded { cached: false, status: 200, .. }
    ));
    assert!(matches!(
        received[2],
        IntegrationEvent::RequestSucceeded { cached: true, .. }
    ));
    assert_eq!(
        received[3],
        IntegrationEvent::EndpointUnregistered {
            endpoint_id: "users".to_string()
        }
    );
}
