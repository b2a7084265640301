//! Conduit - resilient outbound HTTP integration layer
//!
//! This library manages a registry of third-party HTTP endpoints and calls
//! them through per-endpoint rate limiting, response caching, authentication
//! and retry with backoff. [`service::IntegrationService`] is the entry point.

pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod health;
pub mod logging;
pub mod maintenance;
pub mod metrics;
pub mod rate_limit;
pub mod registry;
pub mod retry;
pub mod service;
pub mod transport;
