//! The integration service: one entry point sequencing every component.
//!
//! Per request: lookup, rate limit check, cache check (skipped on
//! `force_refresh`), retried execution, cache write, metrics update and
//! event publication. All state lives in the service value; there is no
//! global instance.

mod types;
#[cfg(test)]
mod tests;

pub use types::*;

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::Instrument;

use crate::auth::{AuthHeaderResolver, TokenProvider};
use crate::cache::{CacheKeyStrategy, ResponseCache};
use crate::config::MaintenanceConfig;
use crate::error::IntegrationError;
use crate::events::{EventBus, IntegrationEvent, DEFAULT_EVENT_CAPACITY};
use crate::executor::{RequestExecutor, RequestOptions, ResponseEnvelope};
use crate::health::HealthReport;
use crate::logging::generate_request_id;
use crate::maintenance::Maintenance;
use crate::metrics::{EndpointMetrics, MetricsAggregator, RequestOutcome};
use crate::rate_limit::RateLimiter;
use crate::registry::{Endpoint, EndpointRegistry, EndpointUpdate};
use crate::retry::RetryCoordinator;
use crate::transport::HttpTransport;

/// Builder for [`IntegrationService`].
pub struct IntegrationServiceBuilder {
    transport: Arc<dyn HttpTransport>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    cache_key_strategy: CacheKeyStrategy,
    event_capacity: usize,
}

impl IntegrationServiceBuilder {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            token_provider: None,
            cache_key_strategy: CacheKeyStrategy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Source of bearer tokens for `oauth2` endpoints.
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn cache_key_strategy(mut self, strategy: CacheKeyStrategy) -> Self {
        self.cache_key_strategy = strategy;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn build(self) -> IntegrationService {
        let auth = match self.token_provider {
            Some(provider) => AuthHeaderResolver::with_token_provider(provider),
            None => AuthHeaderResolver::new(),
        };
        let executor = RequestExecutor::new(self.transport, auth);

        IntegrationService {
            registry: EndpointRegistry::new(),
            limiter: Arc::new(RateLimiter::new()),
            cache: Arc::new(ResponseCache::new()),
            metrics: MetricsAggregator::new(),
            retry: RetryCoordinator::new(executor),
            events: EventBus::new(self.event_capacity),
            cache_key_strategy: self.cache_key_strategy,
        }
    }
}

/// Resilient outbound HTTP integration service.
///
/// # Examples
///
/// ```
/// use conduit::registry::Endpoint;
/// use conduit::service::IntegrationService;
/// use conduit::transport::ReqwestTransport;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let transport = ReqwestTransport::new("conduit-doc", Duration::from_secs(5)).unwrap();
/// let service = IntegrationService::builder(Arc::new(transport)).build();
/// service
///     .register_endpoint(Endpoint::new("users", "Users", "https://api.example.com/users"))
///     .unwrap();
/// assert_eq!(service.list_endpoints().len(), 1);
/// ```
#[derive(Debug)]
pub struct IntegrationService {
    registry: EndpointRegistry,
    limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    metrics: MetricsAggregator,
    retry: RetryCoordinator,
    events: EventBus,
    cache_key_strategy: CacheKeyStrategy,
}

impl IntegrationService {
    pub fn builder(transport: Arc<dyn HttpTransport>) -> IntegrationServiceBuilder {
        IntegrationServiceBuilder::new(transport)
    }

    // ------------------------------------------------------------------
    // Endpoint management
    // ------------------------------------------------------------------

    /// Register `endpoint` with zeroed metrics.
    ///
    /// Fails with `InvalidEndpoint` when the definition does not pass
    /// [`Endpoint::validate`].
    pub fn register_endpoint(&self, endpoint: Endpoint) -> Result<(), IntegrationError> {
        let id = endpoint.id.clone();
        self.registry.register(endpoint)?;
        self.metrics.reset(&id);

        tracing::info!(endpoint_id = %id, "Endpoint registered");
        self.events
            .publish(IntegrationEvent::EndpointRegistered { endpoint_id: id });
        Ok(())
    }

    /// Remove an endpoint with its cache entries, limiter state and metrics.
    pub fn unregister_endpoint(&self, endpoint_id: &str) -> Result<(), IntegrationError> {
        self.registry.unregister(endpoint_id)?;
        let evicted = self.cache.invalidate_endpoint(endpoint_id);
        self.limiter.reset(endpoint_id);
        self.metrics.remove(endpoint_id);

        tracing::info!(endpoint_id, evicted, "Endpoint unregistered");
        self.events.publish(IntegrationEvent::EndpointUnregistered {
            endpoint_id: endpoint_id.to_string(),
        });
        Ok(())
    }

    /// Shallow-merge `update` into the endpoint. Cached responses of the
    /// endpoint are dropped since they may no longer match its definition.
    pub fn update_endpoint(
        &self,
        endpoint_id: &str,
        update: EndpointUpdate,
    ) -> Result<Endpoint, IntegrationError> {
        let endpoint = self.registry.update(endpoint_id, update)?;
        self.cache.invalidate_endpoint(endpoint_id);

        tracing::info!(endpoint_id, "Endpoint updated");
        self.events.publish(IntegrationEvent::EndpointUpdated {
            endpoint_id: endpoint_id.to_string(),
        });
        Ok(endpoint)
    }

    pub fn get_endpoint(&self, endpoint_id: &str) -> Option<Endpoint> {
        self.registry.get(endpoint_id)
    }

    /// All endpoints, sorted by id.
    pub fn list_endpoints(&self) -> Vec<Endpoint> {
        self.registry.list()
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// Issue a logical request to a registered endpoint.
    ///
    /// # Errors
    ///
    /// `NotFound`, `RateLimitExceeded`, `RequestTimeout`, `HttpError`,
    /// `RetryExhausted`, and the transport/auth failures of the executor.
    pub async fn request(
        &self,
        endpoint_id: &str,
        options: RequestOptions,
    ) -> Result<ResponseEnvelope, IntegrationError> {
        let request_id = generate_request_id();
        let span = tracing::info_span!("request", %request_id, endpoint_id);
        self.request_inner(endpoint_id, &options)
            .instrument(span)
            .await
    }

    async fn request_inner(
        &self,
        endpoint_id: &str,
        options: &RequestOptions,
    ) -> Result<ResponseEnvelope, IntegrationError> {
        let endpoint = self
            .registry
            .get(endpoint_id)
            .ok_or_else(|| IntegrationError::NotFound(endpoint_id.to_string()))?;
        let start = Instant::now();

        if let Err(err) = self
            .limiter
            .admit(&endpoint.id, endpoint.rate_limit.as_ref())
            .await
        {
            self.metrics.record_rate_limit_hit(&endpoint.id);
            self.metrics
                .record(&endpoint.id, start.elapsed(), false, Some(RequestOutcome::Failure));
            tracing::warn!(error = %err, "Request rejected by rate limiter");
            self.events.publish(IntegrationEvent::RateLimited {
                endpoint_id: endpoint.id.clone(),
            });
            return Err(err);
        }

        let cache_key = endpoint
            .cache_enabled()
            .then(|| self.cache_key_strategy.key(&endpoint.id, options));

        if let Some(key) = cache_key.as_deref().filter(|_| !options.force_refresh) {
            if let Some(hit) = self.cache.get(key) {
                let envelope = hit.as_cached();
                self.metrics.record(&endpoint.id, start.elapsed(), true, None);
                tracing::debug!(status = envelope.status, "Served from cache");
                self.publish_success(&endpoint.id, &envelope, start);
                return Ok(envelope);
            }
        }

        match self.retry.execute(&endpoint, options).await {
            Ok(envelope) => {
                if let (Some(key), Some(cache)) = (cache_key, endpoint.cache.as_ref()) {
                    self.cache.put(key, envelope.clone(), cache.ttl_duration());
                }
                self.metrics
                    .record(&endpoint.id, start.elapsed(), false, Some(RequestOutcome::Success));
                tracing::info!(
                    status = envelope.status,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Request completed"
                );
                self.publish_success(&endpoint.id, &envelope, start);
                Ok(envelope)
            }
            Err(err) => {
                self.metrics
                    .record(&endpoint.id, start.elapsed(), false, Some(RequestOutcome::Failure));
                tracing::warn!(error = %err, "Request failed");
                self.events.publish(IntegrationEvent::RequestFailed {
                    endpoint_id: endpoint.id.clone(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn publish_success(&self, endpoint_id: &str, envelope: &ResponseEnvelope, start: Instant) {
        self.events.publish(IntegrationEvent::RequestSucceeded {
            endpoint_id: endpoint_id.to_string(),
            status: envelope.status,
            duration_ms: start.elapsed().as_millis() as u64,
            cached: envelope.cached,
        });
    }

    /// Run every item concurrently. A failing item never aborts the others.
    pub async fn batch_request(&self, items: Vec<BatchItem>) -> BatchResult {
        let attempted = items.len();
        let outcomes = join_all(items.into_iter().map(|item| async move {
            let result = self.request(&item.endpoint_id, item.options).await;
            (item.endpoint_id, result)
        }))
        .await;

        let mut result = BatchResult::default();
        for (endpoint_id, outcome) in outcomes {
            match outcome {
                Ok(envelope) => {
                    result.summary.succeeded += 1;
                    result.responses.insert(endpoint_id, envelope);
                }
                Err(error) => {
                    result.summary.failed += 1;
                    result.failures.push(BatchFailure { endpoint_id, error });
                }
            }
        }
        result.summary.attempted = attempted;

        tracing::info!(
            attempted,
            succeeded = result.summary.succeeded,
            failed = result.summary.failed,
            "Batch request completed"
        );
        result
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    /// Check one endpoint with a fresh request.
    ///
    /// # Errors
    ///
    /// `NotFound` when the endpoint is not registered; every other failure
    /// is reported as an unhealthy [`HealthReport`].
    pub async fn health_check(&self, endpoint_id: &str) -> Result<HealthReport, IntegrationError> {
        if !self.registry.contains(endpoint_id) {
            return Err(IntegrationError::NotFound(endpoint_id.to_string()));
        }

        let start = Instant::now();
        let outcome = self
            .request(endpoint_id, RequestOptions::new().force_refresh())
            .await;
        let report = HealthReport::from_outcome(endpoint_id, &outcome, start.elapsed());

        tracing::debug!(
            endpoint_id,
            status = %report.status,
            response_time_ms = report.response_time_ms,
            "Health check completed"
        );
        Ok(report)
    }

    /// Check all registered endpoints concurrently, sorted by id.
    pub async fn health_check_all(&self) -> Vec<HealthReport> {
        let ids = self.registry.ids();
        let checks = ids.iter().map(|id| async move {
            match self.health_check(id).await {
                Ok(report) => report,
                // unregistered while the batch was running
                Err(err) => HealthReport::from_outcome(id, &Err(err), std::time::Duration::ZERO),
            }
        });
        join_all(checks).await
    }

    // ------------------------------------------------------------------
    // Metrics and cache
    // ------------------------------------------------------------------

    pub fn get_metrics(&self, endpoint_id: &str) -> Option<EndpointMetrics> {
        self.metrics.get(endpoint_id)
    }

    pub fn get_all_metrics(&self) -> BTreeMap<String, EndpointMetrics> {
        self.metrics.all().into_iter().collect()
    }

    /// Clear one endpoint's cached responses, or the whole cache.
    pub fn clear_cache(&self, endpoint_id: Option<&str>) {
        match endpoint_id {
            Some(id) => {
                let removed = self.cache.invalidate_endpoint(id);
                tracing::debug!(endpoint_id = id, removed, "Cache cleared for endpoint");
            }
            None => {
                self.cache.clear();
                tracing::debug!("Cache cleared");
            }
        }
        self.events.publish(IntegrationEvent::CacheCleared {
            endpoint_id: endpoint_id.map(str::to_string),
        });
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Registry as a JSON document `{ endpoints, exportedAt }`.
    pub fn export_configuration(&self) -> Result<String, IntegrationError> {
        let document = ConfigurationDocument {
            endpoints: self.registry.list(),
            exported_at: Some(Utc::now()),
        };
        serde_json::to_string_pretty(&document).map_err(|e| IntegrationError::Export(e.to_string()))
    }

    /// Replace all endpoints with those of `json`.
    ///
    /// The payload is parsed and every definition validated before anything
    /// is cleared. Endpoints, cache,
    /// limiter state and metrics are then cleared and the new endpoints are
    /// registered one by one; a failure partway (duplicate id) leaves the
    /// endpoints registered so far in place.
    ///
    /// Returns the number of endpoints registered.
    pub fn import_configuration(&self, json: &str) -> Result<usize, IntegrationError> {
        let document: ConfigurationDocument =
            serde_json::from_str(json).map_err(|e| IntegrationError::Import(e.to_string()))?;
        for endpoint in &document.endpoints {
            endpoint
                .validate()
                .map_err(|e| IntegrationError::Import(e.to_string()))?;
        }

        self.registry.clear();
        self.cache.clear();
        self.limiter.clear();
        self.metrics.clear();

        let mut registered = 0;
        for endpoint in document.endpoints {
            self.register_endpoint(endpoint)
                .map_err(|e| IntegrationError::Import(e.to_string()))?;
            registered += 1;
        }

        tracing::info!(endpoints = registered, "Configuration imported");
        self.events.publish(IntegrationEvent::ConfigurationImported {
            endpoints: registered,
        });
        Ok(registered)
    }

    // ------------------------------------------------------------------
    // Events and background work
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<IntegrationEvent> {
        self.events.subscribe()
    }

    /// Periodic sweeps over this service's cache and limiter state.
    pub fn maintenance(&self, config: &MaintenanceConfig) -> Maintenance {
        Maintenance::new(Arc::clone(&self.cache), Arc::clone(&self.limiter), config)
    }

    pub fn cache_key_strategy(&self) -> CacheKeyStrategy {
        self.cache_key_strategy
    }
}
