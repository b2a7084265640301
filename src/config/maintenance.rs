//! Cache and background maintenance settings

use serde::{Deserialize, Serialize};

use crate::cache::CacheKeyStrategy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub key_strategy: CacheKeyStrategy,
}

/// Intervals of the periodic sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Expired cache entry sweep
    pub cache_sweep_seconds: u64,
    /// Idle rate limiter window sweep
    pub rate_limit_sweep_seconds: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            cache_sweep_seconds: 300,
            rate_limit_sweep_seconds: 3600,
        }
    }
}
