//! Best-effort forwarding of events to a backend endpoint.

use super::events::TriggerPayload;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use karakuri_core::AutomationError;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use url::Url;

/// JSON body posted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardEnvelope {
    pub event: String,
    pub metadata: TriggerPayload,
    /// ISO-8601 timestamp with millisecond precision.
    pub time: String,
}

impl ForwardEnvelope {
    pub fn new(event: impl Into<String>, metadata: Option<TriggerPayload>, at: DateTime<Utc>) -> Self {
        Self {
            event: event.into(),
            metadata: metadata.unwrap_or_default(),
            time: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Delivers an envelope to a remote endpoint.
#[async_trait]
pub trait EventForwarder: Send + Sync + Debug {
    async fn forward(&self, url: &Url, envelope: &ForwardEnvelope) -> Result<(), AutomationError>;
}

/// Posts envelopes as JSON over HTTP. Non-2xx responses are failures.
#[derive(Debug, Clone, Default)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventForwarder for HttpForwarder {
    async fn forward(&self, url: &Url, envelope: &ForwardEnvelope) -> Result<(), AutomationError> {
        self.client
            .post(url.clone())
            .json(envelope)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map(|_| ())
            .map_err(|e| AutomationError::Forwarding(e.to_string()))
    }
}
