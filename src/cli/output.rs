//! Output formatting helpers for CLI commands

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

use crate::health::{HealthReport, HealthStatus};
use crate::registry::Endpoint;

/// View model for endpoint display
#[derive(Debug, Clone, serde::Serialize)]
pub struct EndpointView {
    pub id: String,
    pub name: String,
    pub method: String,
    pub url: String,
    pub auth: String,
    pub timeout_ms: u64,
    /// `requests/window_ms`, with `+queue` when callers wait
    pub rate_limit: Option<String>,
    pub cache_ttl_ms: Option<u64>,
    pub max_attempts: u32,
}

impl From<&Endpoint> for EndpointView {
    fn from(endpoint: &Endpoint) -> Self {
        let rate_limit = endpoint.rate_limit.as_ref().map(|rl| {
            let queue = if rl.queue { "+queue" } else { "" };
            format!("{}/{}ms{}", rl.requests, rl.window, queue)
        });
        let cache_ttl_ms = endpoint
            .cache
            .as_ref()
            .filter(|_| endpoint.cache_enabled())
            .map(|c| c.ttl);
        let max_attempts = endpoint
            .effective_retry_policy()
            .map(|p| p.max_attempts)
            .unwrap_or(1);

        Self {
            id: endpoint.id.clone(),
            name: endpoint.name.clone(),
            method: endpoint.method.to_string(),
            url: endpoint.url.clone(),
            auth: endpoint.auth.kind().to_string(),
            timeout_ms: endpoint.timeout,
            rate_limit,
            cache_ttl_ms,
            max_attempts,
        }
    }
}

/// Format endpoints as a table
pub fn format_endpoints_table(endpoints: &[EndpointView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID", "Method", "URL", "Auth", "Timeout", "Rate Limit", "Cache", "Attempts",
    ]);

    for e in endpoints {
        table.add_row(vec![
            Cell::new(&e.id),
            Cell::new(&e.method),
            Cell::new(&e.url),
            Cell::new(&e.auth),
            Cell::new(format!("{}ms", e.timeout_ms)),
            Cell::new(e.rate_limit.as_deref().unwrap_or("-")),
            Cell::new(
                e.cache_ttl_ms
                    .map(|ttl| format!("{}ms", ttl))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(e.max_attempts),
        ]);
    }

    table.to_string()
}

/// Format endpoints as JSON
pub fn format_endpoints_json(endpoints: &[EndpointView]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&json!({
        "endpoints": endpoints
    }))?)
}

fn colored_status(status: HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "Healthy".green().to_string(),
        HealthStatus::Degraded => "Degraded".yellow().to_string(),
        HealthStatus::Unhealthy => "Unhealthy".red().to_string(),
    }
}

/// Format health reports as a table followed by a one-line summary
pub fn format_health_table(reports: &[HealthReport]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Endpoint", "Status", "Code", "Latency", "Error"]);

    for r in reports {
        table.add_row(vec![
            Cell::new(&r.endpoint_id),
            Cell::new(colored_status(r.status)),
            Cell::new(
                r.status_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(format!("{}ms", r.response_time_ms)),
            Cell::new(r.error.as_deref().unwrap_or("")),
        ]);
    }

    let healthy = reports.iter().filter(|r| r.is_healthy()).count();
    format!("{}\n{}/{} endpoints healthy", table, healthy, reports.len())
}

/// Format health reports as JSON
pub fn format_health_json(reports: &[HealthReport]) -> anyhow::Result<String> {
    let healthy = reports.iter().filter(|r| r.is_healthy()).count();
    Ok(serde_json::to_string_pretty(&json!({
        "summary": {
            "total": reports.len(),
            "healthy": healthy,
        },
        "endpoints": reports,
    }))?)
}
