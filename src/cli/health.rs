//! Health command implementation

use crate::cli::output::{format_health_json, format_health_table};
use crate::cli::HealthArgs;
use crate::service::IntegrationService;

/// Handle `conduit health`
///
/// With `--prometheus`, `prometheus` must be the handle of the recorder
/// installed before the checks ran.
pub async fn handle_health(
    args: &HealthArgs,
    service: &IntegrationService,
    prometheus: Option<&metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<String> {
    let reports = service.health_check_all().await;

    if args.prometheus {
        return Ok(prometheus.map(|handle| handle.render()).unwrap_or_default());
    }
    if args.json {
        return format_health_json(&reports);
    }
    if reports.is_empty() {
        return Ok("No endpoints configured.".to_string());
    }
    Ok(format_health_table(&reports))
}
