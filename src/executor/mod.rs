//! Single physical request execution.
//!
//! Merges endpoint defaults with call options, resolves auth headers, applies
//! the hard timeout, classifies the status and decodes the body.

mod envelope;

pub use envelope::*;

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::AuthHeaderResolver;
use crate::error::IntegrationError;
use crate::registry::{Endpoint, RequestBody};
use crate::transport::{HttpTransport, TransportRequest, TransportResponse};

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Issues exactly one HTTP call per [`RequestExecutor::execute`].
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    auth: AuthHeaderResolver,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, auth: AuthHeaderResolver) -> Self {
        Self { transport, auth }
    }

    /// Target URL with endpoint query parameters, then call-level ones.
    ///
    /// Parameters already present in the endpoint URL are kept unless one of
    /// the maps overrides them.
    pub fn build_url(endpoint: &Endpoint, options: &RequestOptions) -> Result<url::Url, IntegrationError> {
        let mut url = url::Url::parse(&endpoint.url).map_err(|e| IntegrationError::InvalidRequest {
            endpoint: endpoint.id.clone(),
            message: format!("invalid URL '{}': {}", endpoint.url, e),
        })?;

        if endpoint.query_params.is_empty() && options.query.is_empty() {
            return Ok(url);
        }

        let mut params: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        params.extend(endpoint.query_params.iter().map(|(k, v)| (k.clone(), v.clone())));
        params.extend(options.query.iter().map(|(k, v)| (k.clone(), v.clone())));

        url.query_pairs_mut().clear().extend_pairs(params.iter());
        Ok(url)
    }

    /// Headers with lower-cased names: content type default, endpoint, call.
    pub fn merge_headers(endpoint: &Endpoint, options: &RequestOptions) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), DEFAULT_CONTENT_TYPE.to_string());
        for (name, value) in endpoint.headers.iter().chain(options.headers.iter()) {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        headers
    }

    fn encode_body(body: &RequestBody) -> Vec<u8> {
        match body {
            RequestBody::Json(serde_json::Value::String(text)) | RequestBody::Text(text) => {
                text.clone().into_bytes()
            }
            RequestBody::Json(value) => value.to_string().into_bytes(),
        }
    }

    /// Execute one call against `endpoint`.
    ///
    /// # Errors
    ///
    /// - `RequestTimeout` when the deadline passes
    /// - `HttpError` for any status outside 200–299
    /// - `Transport` / `InvalidRequest` for connection or build failures
    /// - `AuthUnavailable` when an OAuth2 token cannot be supplied
    pub async fn execute(
        &self,
        endpoint: &Endpoint,
        options: &RequestOptions,
    ) -> Result<ResponseEnvelope, IntegrationError> {
        let url = Self::build_url(endpoint, options)?;
        let mut headers = Self::merge_headers(endpoint, options);
        self.auth.resolve(&endpoint.id, &mut headers, &endpoint.auth).await?;

        let body = RequestBody::merged(endpoint.body.as_ref(), options.body.as_ref());
        let body = match body {
            Some(body) if endpoint.method.allows_body() => Some(Self::encode_body(&body)),
            Some(_) => {
                tracing::debug!(
                    endpoint_id = %endpoint.id,
                    method = %endpoint.method,
                    "Dropping request body for method without body"
                );
                None
            }
            None => None,
        };

        let timeout = Duration::from_millis(options.timeout.unwrap_or(endpoint.timeout));
        let request = TransportRequest {
            method: endpoint.method,
            url: url.clone(),
            headers,
            body,
            timeout,
        };

        let started_at = Utc::now();
        let start = Instant::now();

        tracing::debug!(
            endpoint_id = %endpoint.id,
            method = %endpoint.method,
            url = %url,
            timeout_ms = timeout.as_millis() as u64,
            "Sending request"
        );

        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(IntegrationError::from_transport(&endpoint.id, e)),
            Err(_) => {
                return Err(IntegrationError::RequestTimeout {
                    endpoint: endpoint.id.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let ended_at = Utc::now();

        if !(200..300).contains(&response.status) {
            tracing::debug!(
                endpoint_id = %endpoint.id,
                status = response.status,
                duration_ms,
                "Request returned error status"
            );
            return Err(IntegrationError::HttpError {
                status: response.status,
                status_text: response.status_text.clone(),
            });
        }

        let headers = collect_headers(&response);
        let data = decode_body(&endpoint.id, &response);

        Ok(ResponseEnvelope {
            data,
            status: response.status,
            status_text: response.status_text,
            headers,
            url: url.to_string(),
            timing: ResponseTiming {
                start: started_at,
                end: ended_at,
                duration_ms,
            },
            cached: false,
            error: None,
        })
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

/// Response headers as a plain map; repeated headers are comma-joined.
fn collect_headers(response: &TransportResponse) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = HashMap::new();
    for (name, value) in &response.headers {
        headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.clone());
    }
    headers
}

/// Decode by declared content type: JSON, any text subtype, otherwise bytes.
fn decode_body(endpoint_id: &str, response: &TransportResponse) -> ResponseBody {
    let content_type = response
        .header("content-type")
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("application/json") || content_type.contains("+json") {
        if response.body.is_empty() {
            return ResponseBody::Json(serde_json::Value::Null);
        }
        match serde_json::from_slice(&response.body) {
            Ok(value) => ResponseBody::Json(value),
            Err(error) => {
                tracing::warn!(
                    endpoint_id = %endpoint_id,
                    error = %error,
                    "Response declared JSON but failed to parse, returning text"
                );
                ResponseBody::Text(String::from_utf8_lossy(&response.body).into_owned())
            }
        }
    } else if content_type.starts_with("text/") {
        ResponseBody::Text(String::from_utf8_lossy(&response.body).into_owned())
    } else {
        ResponseBody::Binary(response.body.clone())
    }
}
