use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::IntegrationError;
use crate::executor::{RequestOptions, ResponseEnvelope};
use crate::registry::Endpoint;

/// One entry of a batch request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub endpoint_id: String,
    #[serde(default)]
    pub options: RequestOptions,
}

impl BatchItem {
    pub fn new(endpoint_id: impl Into<String>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// A batch item that did not produce a response.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub endpoint_id: String,
    pub error: IntegrationError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Outcome of [`IntegrationService::batch_request`](super::IntegrationService::batch_request).
///
/// `responses` holds successful items keyed by endpoint id; when the same id
/// appears more than once the last successful item wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub responses: BTreeMap<String, ResponseEnvelope>,
    pub failures: Vec<BatchFailure>,
    pub summary: BatchSummary,
}

/// Serialized form of the registry used by export and import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationDocument {
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}
