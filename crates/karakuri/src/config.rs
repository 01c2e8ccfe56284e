//! Automation configuration.

use karakuri_core::AutomationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Runtime settings for the automation façade and the status poller.
///
/// Every field has a default, so an empty JSON object or an empty
/// environment is a valid configuration. A missing backend URL disables
/// event forwarding; it is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Endpoint that receives forwarded flow and webhook events.
    pub backend_events_url: Option<Url>,
    /// Upper bound for a single forwarding request, in milliseconds.
    pub forward_timeout_ms: u64,
    /// Base URL of the status service polled for `backend_status` events.
    pub status_base_url: Option<Url>,
    /// Delay between two status polls, in milliseconds.
    pub status_interval_ms: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            backend_events_url: None,
            forward_timeout_ms: 5_000,
            status_base_url: None,
            status_interval_ms: 10_000,
        }
    }
}

impl AutomationConfig {
    pub const BACKEND_EVENTS_URL_VAR: &'static str = "KARAKURI_BACKEND_EVENTS_URL";
    pub const FORWARD_TIMEOUT_VAR: &'static str = "KARAKURI_FORWARD_TIMEOUT_MS";
    pub const STATUS_BASE_URL_VAR: &'static str = "KARAKURI_STATUS_BASE_URL";
    pub const STATUS_INTERVAL_VAR: &'static str = "KARAKURI_STATUS_INTERVAL_MS";

    /// Sets the backend events endpoint.
    pub fn with_backend_events_url(mut self, url: Url) -> Self {
        self.backend_events_url = Some(url);
        self
    }

    /// Sets the status service base URL.
    pub fn with_status_base_url(mut self, url: Url) -> Self {
        self.status_base_url = Some(url);
        self
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    /// Reads the configuration from `KARAKURI_*` environment variables.
    pub fn from_env() -> Result<Self, AutomationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AutomationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(raw) = get(Self::BACKEND_EVENTS_URL_VAR) {
            config.backend_events_url = Some(parse_url(Self::BACKEND_EVENTS_URL_VAR, &raw)?);
        }
        if let Some(raw) = get(Self::STATUS_BASE_URL_VAR) {
            config.status_base_url = Some(parse_url(Self::STATUS_BASE_URL_VAR, &raw)?);
        }
        if let Some(raw) = get(Self::FORWARD_TIMEOUT_VAR) {
            config.forward_timeout_ms = parse_millis(Self::FORWARD_TIMEOUT_VAR, &raw)?;
        }
        if let Some(raw) = get(Self::STATUS_INTERVAL_VAR) {
            config.status_interval_ms = parse_millis(Self::STATUS_INTERVAL_VAR, &raw)?;
        }
        Ok(config)
    }

    /// Parses a JSON document such as `{"backend_events_url": "https://..."}`.
    pub fn from_json(json: &str) -> Result<Self, AutomationError> {
        serde_json::from_str(json).map_err(|e| AutomationError::Configuration(e.to_string()))
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, AutomationError> {
    Url::parse(raw.trim())
        .map_err(|e| AutomationError::Configuration(format!("{key}: {e}")))
}

fn parse_millis(key: &str, raw: &str) -> Result<u64, AutomationError> {
    raw.trim()
        .parse()
        .map_err(|e| AutomationError::Configuration(format!("{key}: {e}")))
}
