//! Periodic polling of the backend status service.
//!
//! Each successful poll is injected into the page as a `backend_status`
//! webhook event. Failed polls are dropped and retried on the next tick.

use crate::api::{AutomationApi, TriggerPayload};
use crate::config::AutomationConfig;
use async_trait::async_trait;
use karakuri_core::AutomationError;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

/// Webhook event name used for status updates.
pub const STATUS_EVENT: &str = "backend_status";

/// Snapshot reported by the status service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_balance_eth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_price_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks_ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl BackendStatus {
    /// Converts the snapshot into a webhook payload.
    pub fn to_payload(&self) -> TriggerPayload {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => TriggerPayload::new(),
        }
    }
}

/// Where status snapshots come from.
#[async_trait]
pub trait StatusSource: Send + Sync + Debug {
    async fn fetch(&self) -> Result<BackendStatus, AutomationError>;
}

/// Fetches `<base>/status` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpStatusSource {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(base: Url) -> Result<Self, AutomationError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AutomationError::Configuration(e.to_string()))?;
        Self::with_client(client, base)
    }

    pub fn with_client(client: reqwest::Client, mut base: Url) -> Result<Self, AutomationError> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("status")
            .map_err(|e| AutomationError::Configuration(format!("status URL: {e}")))?;
        Ok(Self { client, endpoint })
    }

    /// Builds a source from `status_base_url`, if one is configured.
    pub fn from_config(config: &AutomationConfig) -> Result<Option<Self>, AutomationError> {
        config.status_base_url.clone().map(Self::new).transpose()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self) -> Result<BackendStatus, AutomationError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AutomationError::Forwarding(e.to_string()))?;
        response
            .json::<BackendStatus>()
            .await
            .map_err(|e| AutomationError::Forwarding(e.to_string()))
    }
}

/// Polls a [`StatusSource`] on a fixed interval.
#[derive(Debug)]
pub struct StatusPoller<S> {
    source: S,
    interval: Duration,
}

impl<S: StatusSource + 'static> StatusPoller<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// Starts polling in the background. The first poll happens immediately.
    ///
    /// Polling stops when the returned handle is stopped or dropped.
    pub fn start(self, api: Arc<AutomationApi>) -> PollerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        info!(interval = ?self.interval, "Status polling started");

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    result = self.source.fetch() => match result {
                        Ok(status) => api.webhook_event(STATUS_EVENT, Some(status.to_payload())),
                        Err(e) => debug!(error = %e, "Status poll failed"),
                    },
                }
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            debug!("Status polling stopped");
        });

        PollerHandle {
            token,
            task: Some(task),
        }
    }
}

/// Handle to a running [`StatusPoller`].
#[derive(Debug)]
pub struct PollerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stops polling and waits for the loop to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
