//! Configuration module for Conduit
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`CONDUIT_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use conduit::config::ConduitConfig;
//!
//! let toml = r#"
//! [maintenance]
//! cache_sweep_seconds = 60
//!
//! [[endpoints]]
//! id = "users"
//! name = "Users"
//! url = "https://api.example.com/users"
//! "#;
//! let config: ConduitConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.maintenance.cache_sweep_seconds, 60);
//! assert_eq!(config.endpoints[0].timeout, 30_000);
//! ```

pub mod client;
pub mod error;
pub mod logging;
pub mod maintenance;

pub use client::ClientConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use maintenance::{CacheSettings, MaintenanceConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::registry::{Endpoint, RegistryError};

/// Unified configuration: ambient settings plus the endpoints to register.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConduitConfig {
    pub logging: LoggingConfig,
    /// Default transport settings
    pub client: ClientConfig,
    pub cache: CacheSettings,
    /// Background sweep intervals
    pub maintenance: MaintenanceConfig,
    /// Endpoints registered at startup
    pub endpoints: Vec<Endpoint>,
}

impl ConduitConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports CONDUIT_* environment variables for the ambient settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("CONDUIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CONDUIT_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(user_agent) = std::env::var("CONDUIT_USER_AGENT") {
            self.client.user_agent = user_agent;
        }
        if let Ok(timeout) = std::env::var("CONDUIT_CONNECT_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.client.connect_timeout_seconds = t;
            }
        }

        if let Ok(strategy) = std::env::var("CONDUIT_CACHE_KEY_STRATEGY") {
            if let Ok(s) = strategy.parse() {
                self.cache.key_strategy = s;
            }
        }
        if let Ok(seconds) = std::env::var("CONDUIT_CACHE_SWEEP_SECONDS") {
            if let Ok(s) = seconds.parse() {
                self.maintenance.cache_sweep_seconds = s;
            }
        }
        if let Ok(seconds) = std::env::var("CONDUIT_RATE_LIMIT_SWEEP_SECONDS") {
            if let Ok(s) = seconds.parse() {
                self.maintenance.rate_limit_sweep_seconds = s;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.connect_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "client.connect_timeout_seconds",
                "must be non-zero",
            ));
        }
        if self.maintenance.cache_sweep_seconds == 0 {
            return Err(ConfigError::invalid(
                "maintenance.cache_sweep_seconds",
                "must be non-zero",
            ));
        }
        if self.maintenance.rate_limit_sweep_seconds == 0 {
            return Err(ConfigError::invalid(
                "maintenance.rate_limit_sweep_seconds",
                "must be non-zero",
            ));
        }

        let mut seen = HashSet::new();
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            validate_endpoint(i, endpoint)?;
            if !seen.insert(endpoint.id.as_str()) {
                return Err(ConfigError::invalid(
                    format!("endpoints[{}].id", i),
                    format!("duplicate endpoint id '{}'", endpoint.id),
                ));
            }
        }

        Ok(())
    }
}

fn validate_endpoint(index: usize, endpoint: &Endpoint) -> Result<(), ConfigError> {
    endpoint.validate().map_err(|e| match e {
        RegistryError::InvalidEndpoint { field, message, .. } => {
            ConfigError::invalid(format!("endpoints[{}].{}", index, field), message)
        }
        other => ConfigError::invalid(format!("endpoints[{}]", index), other.to_string()),
    })
}
