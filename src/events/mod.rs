//! Integration event types and the broadcast channel they are published on.

use serde::Serialize;
use tokio::sync::broadcast;

/// Default capacity of the event channel. Slow subscribers observe
/// `RecvError::Lagged` rather than blocking publishers.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Notifications published by the integration service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrationEvent {
    EndpointRegistered {
        endpoint_id: String,
    },
    EndpointUpdated {
        endpoint_id: String,
    },
    EndpointUnregistered {
        endpoint_id: String,
    },
    RequestSucceeded {
        endpoint_id: String,
        status: u16,
        duration_ms: u64,
        cached: bool,
    },
    RequestFailed {
        endpoint_id: String,
        error: String,
    },
    RateLimited {
        endpoint_id: String,
    },
    /// `None` when the whole cache was cleared
    CacheCleared {
        endpoint_id: Option<String>,
    },
    ConfigurationImported {
        endpoints: usize,
    },
}

impl IntegrationEvent {
    /// Endpoint the event concerns, if any.
    pub fn endpoint_id(&self) -> Option<&str> {
        match self {
            IntegrationEvent::EndpointRegistered { endpoint_id }
            | IntegrationEvent::EndpointUpdated { endpoint_id }
            | IntegrationEvent::EndpointUnregistered { endpoint_id }
            | IntegrationEvent::RequestSucceeded { endpoint_id, .. }
            | IntegrationEvent::RequestFailed { endpoint_id, .. }
            | IntegrationEvent::RateLimited { endpoint_id } => Some(endpoint_id),
            IntegrationEvent::CacheCleared { endpoint_id } => endpoint_id.as_deref(),
            IntegrationEvent::ConfigurationImported { .. } => None,
        }
    }
}

/// Publishing side of the event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<IntegrationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish `event`. Having no subscribers is not an error.
    pub fn publish(&self, event: IntegrationEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IntegrationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
