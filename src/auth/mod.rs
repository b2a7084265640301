//! Outbound authentication headers.
//!
//! Derives the headers an endpoint's [`AuthConfig`] requires. OAuth2 grant
//! flows are not performed here: tokens for `oauth2` endpoints come from an
//! injected [`TokenProvider`].

use async_trait::async_trait;
use base64::Engine;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::registry::AuthConfig;

/// Errors raised while resolving auth headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// OAuth2 endpoint without a pre-resolved token.
    #[error("no OAuth2 access token available for endpoint '{0}'; token exchange is not performed by this layer")]
    TokenUnavailable(String),
}

/// Supplies pre-resolved bearer tokens for OAuth2 endpoints.
///
/// Implemented by whatever component owns the token lifecycle (grant flow,
/// refresh, storage).
#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    async fn access_token(&self, endpoint_id: &str) -> Option<String>;
}

/// In-memory token store keyed by endpoint id.
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    tokens: DashMap<String, String>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&self, endpoint_id: impl Into<String>, token: impl Into<String>) {
        self.tokens.insert(endpoint_id.into(), token.into());
    }

    pub fn revoke(&self, endpoint_id: &str) {
        self.tokens.remove(endpoint_id);
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self, endpoint_id: &str) -> Option<String> {
        self.tokens.get(endpoint_id).map(|t| t.value().clone())
    }
}

/// Applies an endpoint's auth scheme to a lower-cased header map.
#[derive(Clone, Default)]
pub struct AuthHeaderResolver {
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl AuthHeaderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_provider(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            token_provider: Some(provider),
        }
    }

    /// Insert the auth headers for `auth` into `headers`.
    ///
    /// Auth headers overwrite any header of the same name already present.
    pub async fn resolve(
        &self,
        endpoint_id: &str,
        headers: &mut BTreeMap<String, String>,
        auth: &AuthConfig,
    ) -> Result<(), AuthError> {
        match auth {
            AuthConfig::None => {}
            AuthConfig::Bearer { credentials } => {
                if let Some(token) = credentials.token.as_deref().filter(|t| !t.is_empty()) {
                    headers.insert("authorization".to_string(), format!("Bearer {}", token));
                }
            }
            AuthConfig::ApiKey { credentials } => {
                headers.insert(credentials.header.to_ascii_lowercase(), credentials.key.clone());
            }
            AuthConfig::Basic { credentials } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", credentials.username, credentials.password));
                headers.insert("authorization".to_string(), format!("Basic {}", encoded));
            }
            AuthConfig::OAuth2 { .. } => {
                let token = match &self.token_provider {
                    Some(provider) => provider.access_token(endpoint_id).await,
                    None => None,
                };
                let token = token.ok_or_else(|| AuthError::TokenUnavailable(endpoint_id.to_string()))?;
                headers.insert("authorization".to_string(), format!("Bearer {}", token));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthHeaderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeaderResolver")
            .field("token_provider", &self.token_provider.is_some())
            .finish()
    }
}
