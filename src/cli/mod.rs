//! CLI module for Conduit
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `endpoints` - Inspect configured endpoints
//! - `request` - Issue a request through the integration service
//! - `health` - Health check every configured endpoint
//! - `config` - Configuration utilities (init, export)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # List endpoints from a config file
//! conduit endpoints list -c conduit.toml
//!
//! # Call an endpoint with extra query parameters
//! conduit request weather -q city=Lisbon
//!
//! # Generate shell completions
//! conduit completions bash > ~/.bash_completion.d/conduit
//! ```

pub mod completions;
pub mod config;
pub mod endpoints;
pub mod health;
pub mod output;
pub mod request;

pub use completions::handle_completions;
pub use config::{handle_config_export, handle_config_init};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ConduitConfig;
use crate::service::IntegrationService;
use crate::transport::ReqwestTransport;

/// Conduit - resilient outbound HTTP integration layer
#[derive(Parser, Debug)]
#[command(
    name = "conduit",
    version,
    about = "Rate-limited, cached and retried calls to third-party HTTP APIs"
)]
pub struct Cli {
    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "CONDUIT_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect configured endpoints
    #[command(subcommand)]
    Endpoints(EndpointsCommands),
    /// Issue a request to a configured endpoint
    Request(RequestArgs),
    /// Health check all configured endpoints
    Health(HealthArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Subcommand, Debug)]
pub enum EndpointsCommands {
    /// List configured endpoints
    List(EndpointsListArgs),
}

#[derive(Args, Debug)]
pub struct EndpointsListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "conduit.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Endpoint id
    pub endpoint: String,

    /// Query parameter (repeatable)
    #[arg(short, long = "query", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub query: Vec<(String, String)>,

    /// Request header (repeatable)
    #[arg(short = 'H', long = "header", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub header: Vec<(String, String)>,

    /// Request body; parsed as JSON when possible, sent as text otherwise
    #[arg(short, long)]
    pub body: Option<String>,

    /// Timeout override in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Bypass the cache read
    #[arg(long)]
    pub force_refresh: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "conduit.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Output as JSON
    #[arg(long, conflicts_with = "prometheus")]
    pub json: bool,

    /// Print Prometheus metrics recorded during the checks
    #[arg(long)]
    pub prometheus: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "conduit.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
    /// Print the configured endpoints as an import/export JSON document
    Export(ConfigExportArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "conduit.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigExportArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "conduit.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Parse a `KEY=VALUE` argument.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Load and validate a config file, with environment overrides applied.
pub fn load_config(path: &Path) -> anyhow::Result<ConduitConfig> {
    let config = ConduitConfig::load(Some(path))
        .with_context(|| format!("failed to load {}", path.display()))?
        .with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Build a service over the reqwest transport and register the configured
/// endpoints.
pub fn build_service(config: &ConduitConfig) -> anyhow::Result<IntegrationService> {
    let transport =
        ReqwestTransport::new(&config.client.user_agent, config.client.connect_timeout())?;
    let service = IntegrationService::builder(Arc::new(transport))
        .cache_key_strategy(config.cache.key_strategy)
        .build();

    for endpoint in &config.endpoints {
        service
            .register_endpoint(endpoint.clone())
            .with_context(|| format!("failed to register endpoint '{}'", endpoint.id))?;
    }
    Ok(service)
}
