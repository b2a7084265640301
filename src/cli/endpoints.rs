//! Endpoints command implementation

use crate::cli::output::{format_endpoints_json, format_endpoints_table, EndpointView};
use crate::cli::EndpointsListArgs;
use crate::config::ConduitConfig;

/// Handle `conduit endpoints list`
pub fn handle_endpoints_list(
    args: &EndpointsListArgs,
    config: &ConduitConfig,
) -> anyhow::Result<String> {
    let mut views: Vec<EndpointView> = config.endpoints.iter().map(EndpointView::from).collect();
    views.sort_by(|a, b| a.id.cmp(&b.id));

    if args.json {
        return format_endpoints_json(&views);
    }
    if views.is_empty() {
        return Ok("No endpoints configured.".to_string());
    }
    Ok(format_endpoints_table(&views))
}
