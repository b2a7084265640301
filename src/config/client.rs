//! Outbound HTTP client settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the default reqwest transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub user_agent: String,
    /// TCP connect timeout. Per-request deadlines come from each endpoint.
    pub connect_timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("conduit/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_seconds: 10,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}
