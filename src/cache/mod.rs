//! TTL response cache.
//!
//! Entries carry their own deadline. Reads evict expired entries lazily and
//! the maintenance task calls [`ResponseCache::sweep_expired`] periodically.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::executor::{RequestOptions, ResponseEnvelope};
use crate::registry::{RequestBody, RESERVED_ID_CHAR};

/// Registered ids never contain this, so `id#...` keys belong to `id` alone.
const KEY_SEPARATOR: char = RESERVED_ID_CHAR;

/// How cache keys are derived from a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyStrategy {
    /// The endpoint id alone. Call-level options share one entry.
    #[default]
    EndpointId,
    /// Endpoint id plus the call-level query, headers and body.
    Request,
}

impl CacheKeyStrategy {
    /// Cache key for a call to `endpoint_id` with `options`.
    ///
    /// Call options whose maps are empty and body is absent produce the bare
    /// endpoint id under both strategies.
    pub fn key(&self, endpoint_id: &str, options: &RequestOptions) -> String {
        match self {
            CacheKeyStrategy::EndpointId => endpoint_id.to_string(),
            CacheKeyStrategy::Request => {
                let fingerprint = request_fingerprint(options);
                if fingerprint.is_empty() {
                    endpoint_id.to_string()
                } else {
                    format!("{}{}{}", endpoint_id, KEY_SEPARATOR, fingerprint)
                }
            }
        }
    }
}

impl std::str::FromStr for CacheKeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "endpoint_id" | "endpoint" => Ok(CacheKeyStrategy::EndpointId),
            "request" => Ok(CacheKeyStrategy::Request),
            _ => Err(format!("Invalid cache key strategy: {}", s)),
        }
    }
}

/// Canonical rendering of the cache-relevant call options.
fn request_fingerprint(options: &RequestOptions) -> String {
    let mut parts = Vec::new();

    if !options.query.is_empty() {
        let query: BTreeMap<_, _> = options.query.iter().collect();
        let rendered: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        parts.push(format!("q:{}", rendered.join("&")));
    }

    if !options.headers.is_empty() {
        let headers: BTreeMap<String, &String> = options
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        let rendered: Vec<String> = headers.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        parts.push(format!("h:{}", rendered.join("&")));
    }

    match &options.body {
        Some(RequestBody::Json(value)) => parts.push(format!("b:{}", value)),
        Some(RequestBody::Text(text)) => parts.push(format!("b:{}", text)),
        None => {}
    }

    parts.join("|")
}

#[derive(Debug, Clone)]
struct CacheEntry {
    envelope: ResponseEnvelope,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Concurrent store of response envelopes with per-entry expiry.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unexpired entry for `key`. An expired entry is removed.
    pub fn get(&self, key: &str) -> Option<ResponseEnvelope> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now));
        if removed.is_some() {
            tracing::trace!(key, "Evicted expired cache entry on read");
            return None;
        }
        self.entries.get(key).map(|entry| entry.envelope.clone())
    }

    /// Store `envelope` under `key` for `ttl`, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, envelope: ResponseEnvelope, ttl: Duration) {
        let entry = CacheEntry {
            envelope,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.into(), entry);
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry belonging to `endpoint_id`, whichever key strategy
    /// stored it. Returns the number removed.
    pub fn invalidate_endpoint(&self, endpoint_id: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| !belongs_to(key, endpoint_id));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove all expired entries. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn belongs_to(key: &str, endpoint_id: &str) -> bool {
    match key.strip_prefix(endpoint_id) {
        Some("") => true,
        Some(rest) => rest.starts_with(KEY_SEPARATOR),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ResponseBody, ResponseTiming};
    use chrono::Utc;
    use std::collections::HashMap;

    fn envelope(marker: &str) -> ResponseEnvelope {
        let now = Utc::now();
        ResponseEnvelope {
            data: ResponseBody::Text(marker.to_string()),
            status: 200,
            status_text: "OK".to_string(),
            headers: HashMap::new(),
            url: "https://api.example.com".to_string(),
            timing: ResponseTiming {
                start: now,
                end: now,
                duration_ms: 0,
            },
            cached: false,
            error: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_before_and_after_ttl() {
        let cache = ResponseCache::new();
        cache.put("weather", envelope("sunny"), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(
            cache.get("weather").unwrap().data,
            ResponseBody::Text("sunny".to_string())
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("weather").is_none());
        assert!(cache.is_empty(), "expired entry should be evicted on read");
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_overwrites_and_restarts_ttl() {
        let cache = ResponseCache::new();
        cache.put("a", envelope("first"), Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.put("a", envelope("second"), Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(
            cache.get("a").unwrap().data,
            ResponseBody::Text("second".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expired_counts_removed() {
        let cache = ResponseCache::new();
        cache.put("short", envelope("s"), Duration::from_secs(1));
        cache.put("long", envelope("l"), Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("long").is_some());
    }

    #[test]
    fn test_invalidate_endpoint_matches_id_and_request_keys() {
        let cache = ResponseCache::new();
        let ttl = Duration::from_secs(60);
        cache.put("users", envelope("1"), ttl);
        cache.put("users#q:page=2", envelope("2"), ttl);
        cache.put("users-admin", envelope("3"), ttl);

        assert_eq!(cache.invalidate_endpoint("users"), 2);
        assert!(cache.get("users-admin").is_some());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = ResponseCache::new();
        cache.put("a", envelope("a"), Duration::from_secs(5));
        cache.put("b", envelope("b"), Duration::from_secs(5));

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_endpoint_id_strategy_ignores_options() {
        let options = RequestOptions::new().query("page", "2");
        assert_eq!(CacheKeyStrategy::EndpointId.key("users", &options), "users");
    }

    #[test]
    fn test_request_strategy_is_canonical() {
        let a = RequestOptions::new()
            .query("b", "2")
            .query("a", "1")
            .header("X-Tenant", "acme");
        let b = RequestOptions::new()
            .header("x-tenant", "acme")
            .query("a", "1")
            .query("b", "2");

        let key = CacheKeyStrategy::Request.key("users", &a);
        assert_eq!(key, CacheKeyStrategy::Request.key("users", &b));
        assert_eq!(key, "users#q:a=1&b=2|h:x-tenant=acme");
    }

    #[test]
    fn test_request_strategy_without_options_is_bare_id() {
        assert_eq!(
            CacheKeyStrategy::Request.key("users", &RequestOptions::new()),
            "users"
        );
    }

    #[test]
    fn test_request_strategy_distinguishes_bodies() {
        let a = RequestOptions::new().body(RequestBody::Json(serde_json::json!({"q": 1})));
        let b = RequestOptions::new().body(RequestBody::Json(serde_json::json!({"q": 2})));
        assert_ne!(
            CacheKeyStrategy::Request.key("search", &a),
            CacheKeyStrategy::Request.key("search", &b)
        );
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("request".parse(), Ok(CacheKeyStrategy::Request));
        assert_eq!("endpoint-id".parse(), Ok(CacheKeyStrategy::EndpointId));
        assert!("url".parse::<CacheKeyStrategy>().is_err());
    }

    #[test]
    fn test_strategy_serde_names() {
        let strategy: CacheKeyStrategy = serde_json::from_str("\"request\"").unwrap();
        assert_eq!(strategy, CacheKeyStrategy::Request);
        assert_eq!(
            serde_json::to_string(&CacheKeyStrategy::EndpointId).unwrap(),
            "\"endpoint_id\""
        );
    }
}
