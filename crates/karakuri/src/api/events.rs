//! Page-level events rebroadcast by the façade.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Supplementary data carried by a trigger or webhook. Forwarded opaquely.
pub type TriggerPayload = Map<String, Value>;

/// Event type dispatched for named flow triggers.
pub const FLOW_EVENT: &str = "automation:flow";
/// Event type dispatched for injected webhook events.
pub const WEBHOOK_EVENT: &str = "automation:webhook";

/// Detail of an `automation:flow` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDetail {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<TriggerPayload>,
}

/// Detail of an `automation:webhook` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookDetail {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TriggerPayload>,
}

/// An event observed by UI subscribers.
///
/// Serializes as `{"type": "automation:flow", "detail": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum PageEvent {
    #[serde(rename = "automation:flow")]
    Flow(FlowDetail),
    #[serde(rename = "automation:webhook")]
    Webhook(WebhookDetail),
}

impl PageEvent {
    /// Returns the event type string.
    pub fn event_type(&self) -> &'static str {
        match self {
            PageEvent::Flow(_) => FLOW_EVENT,
            PageEvent::Webhook(_) => WEBHOOK_EVENT,
        }
    }
}

/// Receiving half handed out by [`EventBus::subscribe`].
pub type EventReceiver = mpsc::UnboundedReceiver<PageEvent>;

/// Synchronous, lossless fan-out of [`PageEvent`]s.
///
/// Every subscriber gets its own unbounded queue, so a subscriber registered
/// before [`publish`](Self::publish) returns observes the event no matter how
/// far behind it is. Dropped receivers are pruned on the next publish.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<PageEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> EventReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers().push(sender);
        receiver
    }

    /// Delivers the event to every live subscriber and returns how many there were.
    pub fn publish(&self, event: PageEvent) -> usize {
        let mut subscribers = self.subscribers();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            debug!(event_type = event.event_type(), "No listeners for page event");
        }
        subscribers.len()
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<PageEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
