//! Structured logging setup
//!
//! Builds the tracing filter from [`LoggingConfig`](crate::config::LoggingConfig),
//! installs the subscriber, and generates the correlation ids attached to
//! every request span.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::{LogFormat, LoggingConfig};

/// Tracing filter for `config`: the base level, then one
/// `conduit::<module>=<level>` directive per configured module.
///
/// # Examples
///
/// ```
/// use conduit::config::LoggingConfig;
/// use conduit::logging::build_filter_directives;
///
/// let mut config = LoggingConfig::default();
/// config.modules.insert("retry".to_string(), "debug".to_string());
///
/// assert_eq!(build_filter_directives(&config), "info,conduit::retry=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();
    for (module, level) in &config.modules {
        filter_str.push_str(&format!(",conduit::{}={}", module, level));
    }
    filter_str
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured directives. Logs go to stderr so
/// command output on stdout stays machine-readable.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = build_filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

/// Generate a new request ID using UUID v4
///
/// Attached to the span of a logical request so its retries, cache
/// decisions and metrics updates can be correlated.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
