//! Error taxonomy of the integration layer.

use thiserror::Error;

use crate::auth::AuthError;
use crate::registry::RegistryError;
use crate::transport::TransportError;

/// Errors returned by the public integration operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrationError {
    #[error("endpoint already exists: {0}")]
    DuplicateEndpoint(String),

    #[error("endpoint not found: {0}")]
    NotFound(String),

    /// Endpoint definition rejected at registration or update.
    #[error("invalid endpoint '{endpoint}': {field} {message}")]
    InvalidEndpoint {
        endpoint: String,
        field: String,
        message: String,
    },

    /// Window exhausted and the endpoint does not queue callers.
    #[error("rate limit exceeded for endpoint '{endpoint}', retry after {retry_after_ms}ms")]
    RateLimitExceeded { endpoint: String, retry_after_ms: u64 },

    #[error("request to '{endpoint}' timed out after {timeout_ms}ms")]
    RequestTimeout { endpoint: String, timeout_ms: u64 },

    /// Non-2xx response.
    #[error("HTTP {status}: {status_text}")]
    HttpError { status: u16, status_text: String },

    #[error("all {attempts} attempts to '{endpoint}' failed, last error: {last_error}")]
    RetryExhausted {
        endpoint: String,
        attempts: u32,
        last_error: String,
    },

    /// Malformed configuration payload.
    #[error("configuration import failed: {0}")]
    Import(String),

    #[error("configuration export failed: {0}")]
    Export(String),

    /// Connection level failure before any response.
    #[error("transport error for '{endpoint}': {message}")]
    Transport { endpoint: String, message: String },

    #[error(transparent)]
    AuthUnavailable(#[from] AuthError),

    /// The request could not be built from the endpoint definition.
    #[error("invalid request for '{endpoint}': {message}")]
    InvalidRequest { endpoint: String, message: String },
}

impl IntegrationError {
    /// HTTP status code carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            IntegrationError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt could plausibly succeed when the error has no
    /// status code. Auth and request-building failures never change between
    /// attempts.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IntegrationError::RequestTimeout { .. } | IntegrationError::Transport { .. }
        )
    }

    /// Map a transport failure for the given endpoint.
    pub fn from_transport(endpoint: &str, error: TransportError) -> Self {
        match error {
            TransportError::Timeout(timeout_ms) => IntegrationError::RequestTimeout {
                endpoint: endpoint.to_string(),
                timeout_ms,
            },
            TransportError::Network(message) => IntegrationError::Transport {
                endpoint: endpoint.to_string(),
                message,
            },
            TransportError::InvalidRequest(message) => IntegrationError::InvalidRequest {
                endpoint: endpoint.to_string(),
                message,
            },
        }
    }
}

impl From<RegistryError> for IntegrationError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::DuplicateEndpoint(id) => IntegrationError::DuplicateEndpoint(id),
            RegistryError::EndpointNotFound(id) => IntegrationError::NotFound(id),
            RegistryError::InvalidEndpoint { id, field, message } => {
                IntegrationError::InvalidEndpoint {
                    endpoint: id,
                    field,
                    message,
                }
            }
        }
    }
}
