//! Request command implementation

use crate::cli::RequestArgs;
use crate::executor::RequestOptions;
use crate::registry::RequestBody;
use crate::service::IntegrationService;

/// Translate command arguments into call options.
pub fn request_options(args: &RequestArgs) -> RequestOptions {
    let mut options = RequestOptions::new();
    for (key, value) in &args.query {
        options = options.query(key, value);
    }
    for (key, value) in &args.header {
        options = options.header(key, value);
    }
    if let Some(body) = &args.body {
        let body = match serde_json::from_str(body) {
            Ok(value) => RequestBody::Json(value),
            Err(_) => RequestBody::Text(body.clone()),
        };
        options = options.body(body);
    }
    if let Some(timeout) = args.timeout {
        options = options.timeout_ms(timeout);
    }
    if args.force_refresh {
        options = options.force_refresh();
    }
    options
}

/// Handle `conduit request`; returns the response envelope as JSON.
pub async fn handle_request(
    args: &RequestArgs,
    service: &IntegrationService,
) -> anyhow::Result<String> {
    let envelope = service
        .request(&args.endpoint, request_options(args))
        .await?;
    Ok(serde_json::to_string_pretty(&envelope)?)
}
