use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::RegistryError;

/// Default per-request timeout when an endpoint does not set one.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Separates the endpoint id from the request fingerprint in cache keys, so
/// ids may not contain it.
pub const RESERVED_ID_CHAR: char = '#';

/// Default header used by the API-key auth scheme.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// HTTP method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Whether requests with this method carry a body.
    pub fn allows_body(&self) -> bool {
        !matches!(self, HttpMethod::Get | HttpMethod::Head)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body payload.
///
/// Untagged so that configuration files can write a JSON object or a plain
/// string directly. `Text` is tried first, so a JSON string always reads
/// back as `Text`; `Json` holding a string is encoded as that raw text to
/// keep both forms identical on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    Text(String),
    Json(serde_json::Value),
}

impl RequestBody {
    /// Merge a call-level body over an endpoint default.
    ///
    /// Two JSON objects are shallow-merged with the call-level keys winning;
    /// any other combination is replaced by the call-level body.
    pub fn merged(base: Option<&RequestBody>, overlay: Option<&RequestBody>) -> Option<RequestBody> {
        match (base, overlay) {
            (Some(RequestBody::Json(serde_json::Value::Object(base))), Some(RequestBody::Json(serde_json::Value::Object(call)))) => {
                let mut merged = base.clone();
                for (key, value) in call {
                    merged.insert(key.clone(), value.clone());
                }
                Some(RequestBody::Json(serde_json::Value::Object(merged)))
            }
            (_, Some(call)) => Some(call.clone()),
            (Some(base), None) => Some(base.clone()),
            (None, None) => None,
        }
    }
}

/// Bearer token credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BearerCredentials {
    pub token: Option<String>,
}

/// API key credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCredentials {
    #[serde(alias = "apiKey")]
    pub key: String,
    /// Header that carries the key
    #[serde(default = "default_api_key_header", alias = "headerName")]
    pub header: String,
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

/// HTTP basic credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// OAuth2 client description.
///
/// Carried for configuration round-trips only. Tokens are obtained from a
/// [`crate::auth::TokenProvider`], never exchanged here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct OAuth2Credentials {
    pub client_id: Option<String>,
    pub token_url: Option<String>,
    pub scopes: Vec<String>,
}

/// Authentication scheme of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    #[default]
    None,
    Bearer {
        #[serde(default)]
        credentials: BearerCredentials,
    },
    #[serde(alias = "api-key", alias = "api_key")]
    ApiKey { credentials: ApiKeyCredentials },
    Basic { credentials: BasicCredentials },
    OAuth2 {
        #[serde(default)]
        credentials: OAuth2Credentials,
        #[serde(default, rename = "refreshToken", skip_serializing_if = "Option::is_none")]
        refresh_token: Option<String>,
        #[serde(default, rename = "expiresAt", skip_serializing_if = "Option::is_none")]
        expires_at: Option<DateTime<Utc>>,
    },
}

impl AuthConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::ApiKey { .. } => "apikey",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::OAuth2 { .. } => "oauth2",
        }
    }
}

/// Fixed-window rate limit of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Maximum admissions per window
    pub requests: u32,
    /// Window length in milliseconds
    pub window: u64,
    /// Wait instead of failing when the window is exhausted. Only takes
    /// effect with a `throttle_delay`.
    #[serde(default)]
    pub queue: bool,
    /// Milliseconds a queued caller sleeps before re-checking admission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_delay: Option<u64>,
}

impl RateLimitConfig {
    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window)
    }

    pub fn throttle_duration(&self) -> Option<Duration> {
        self.throttle_delay.map(Duration::from_millis)
    }
}

/// Storage tag of a cache configuration.
///
/// All strategies are served from the in-process cache; the tag is kept so
/// configurations round-trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheStorage {
    #[default]
    Memory,
    #[serde(alias = "localStorage")]
    Local,
    #[serde(alias = "sessionStorage")]
    Session,
}

/// Response caching of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    pub enabled: bool,
    /// Time to live in milliseconds
    pub ttl: u64,
    #[serde(default)]
    pub strategy: CacheStorage,
}

impl CacheConfig {
    pub fn ttl_duration(&self) -> Duration {
        Duration::from_millis(self.ttl)
    }
}

/// Growth of the delay between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Exponential,
    Linear,
    Fixed,
}

/// Retry policy of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,
    /// Base delay in milliseconds
    pub base_delay: u64,
    /// Upper bound for any single delay in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay: Option<u64>,
    /// HTTP status codes worth another attempt
    #[serde(default)]
    pub retryable_status_codes: Vec<u16>,
}

impl RetryPolicy {
    /// Policy used for endpoints that only set the legacy `retries` count.
    pub fn from_retry_count(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            backoff_strategy: BackoffStrategy::Exponential,
            base_delay: 1000,
            max_delay: None,
            retryable_status_codes: vec![408, 429, 500, 502, 503, 504],
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}

/// A registered target for outbound HTTP calls.
///
/// Serializes to the camelCase registration record used by configuration
/// import and export.
///
/// # Examples
///
/// ```
/// use conduit::registry::{Endpoint, HttpMethod};
///
/// let endpoint = Endpoint::new("weather", "Weather API", "https://api.example.com/weather");
/// assert_eq!(endpoint.method, HttpMethod::Get);
/// assert_eq!(endpoint.timeout, 30_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub query_params: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Legacy retry count, used when no retry policy is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Endpoint {
    /// Create a GET endpoint with no policies attached.
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            query_params: HashMap::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT_MS,
            retries: None,
            auth: AuthConfig::None,
            rate_limit: None,
            cache: None,
            retry_policy: None,
        }
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Whether successful responses of this endpoint are cached.
    pub fn cache_enabled(&self) -> bool {
        self.cache.as_ref().is_some_and(|c| c.enabled && c.ttl > 0)
    }

    /// The retry policy in force, falling back to the legacy retry count.
    pub fn effective_retry_policy(&self) -> Option<RetryPolicy> {
        match (&self.retry_policy, self.retries) {
            (Some(policy), _) => Some(policy.clone()),
            (None, Some(retries)) if retries > 0 => Some(RetryPolicy::from_retry_count(retries)),
            _ => None,
        }
    }

    /// Check the definition can be served.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidEndpoint` naming the first bad field.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |field: &str, message: String| {
            Err(RegistryError::InvalidEndpoint {
                id: self.id.clone(),
                field: field.to_string(),
                message,
            })
        };

        if self.id.trim().is_empty() {
            return invalid("id", "cannot be empty".to_string());
        }
        if self.id.contains(RESERVED_ID_CHAR) {
            return invalid("id", format!("must not contain '{}'", RESERVED_ID_CHAR));
        }
        if self.name.trim().is_empty() {
            return invalid("name", "cannot be empty".to_string());
        }
        if let Err(e) = url::Url::parse(&self.url) {
            return invalid("url", format!("invalid URL '{}': {}", self.url, e));
        }
        if self.timeout == 0 {
            return invalid("timeout", "must be non-zero".to_string());
        }

        if let Some(rate_limit) = &self.rate_limit {
            if rate_limit.requests == 0 {
                return invalid(
                    "rateLimit.requests",
                    "must allow at least one request per window".to_string(),
                );
            }
            if rate_limit.window == 0 {
                return invalid("rateLimit.window", "must be non-zero".to_string());
            }
            if rate_limit.throttle_delay == Some(0) {
                return invalid("rateLimit.throttleDelay", "must be non-zero".to_string());
            }
        }

        if let Some(policy) = &self.retry_policy {
            if policy.max_attempts == 0 {
                return invalid("retryPolicy.maxAttempts", "must be at least 1".to_string());
            }
            if policy.max_delay.is_some_and(|max| max < policy.base_delay) {
                return invalid(
                    "retryPolicy.maxDelay",
                    "must not be smaller than baseDelay".to_string(),
                );
            }
        }

        Ok(())
    }

    /// Shallow-merge a partial update. The id never changes.
    pub fn apply(&mut self, update: EndpointUpdate) {
        let EndpointUpdate {
            name,
            url,
            method,
            headers,
            query_params,
            body,
            timeout,
            retries,
            auth,
            rate_limit,
            cache,
            retry_policy,
        } = update;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(url) = url {
            self.url = url;
        }
        if let Some(method) = method {
            self.method = method;
        }
        if let Some(headers) = headers {
            self.headers = headers;
        }
        if let Some(query_params) = query_params {
            self.query_params = query_params;
        }
        if body.is_some() {
            self.body = body;
        }
        if let Some(timeout) = timeout {
            self.timeout = timeout;
        }
        if retries.is_some() {
            self.retries = retries;
        }
        if let Some(auth) = auth {
            self.auth = auth;
        }
        if rate_limit.is_some() {
            self.rate_limit = rate_limit;
        }
        if cache.is_some() {
            self.cache = cache;
        }
        if retry_policy.is_some() {
            self.retry_policy = retry_policy;
        }
    }
}

/// Partial endpoint fields for [`crate::registry::EndpointRegistry::update`].
///
/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub headers: Option<HashMap<String, String>>,
    pub query_params: Option<HashMap<String, String>>,
    pub body: Option<RequestBody>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub auth: Option<AuthConfig>,
    pub rate_limit: Option<RateLimitConfig>,
    pub cache: Option<CacheConfig>,
    pub retry_policy: Option<RetryPolicy>,
}
