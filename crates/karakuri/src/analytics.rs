//! Passive analytics sink backed by local key-value storage.

use crate::clock::{Clock, SystemClock};
use karakuri_core::AutomationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

/// Storage key of the metric log.
pub const METRICS_KEY: &str = "automation_metrics";

/// Local persistent string storage, e.g. a browser's `localStorage`.
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, AutomationError>;
    fn set(&self, key: &str, value: String) -> Result<(), AutomationError>;
}

/// A [`KeyValueStore`] that lives in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, AutomationError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), AutomationError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// A named measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    /// A number, string or boolean.
    pub value: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// A metric as stored in the log, stamped in milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedMetric {
    pub ts: i64,
    #[serde(flatten)]
    pub metric: Metric,
}

/// Records metrics into the `automation_metrics` log.
///
/// Tracking never fails from the caller's point of view: storage problems are
/// logged and dropped. Clones share one writer lock, so concurrent `track`
/// calls never overwrite each other. The log keeps the most recent
/// [`max_entries`](Self::with_max_entries) metrics.
#[derive(Debug, Clone)]
pub struct Analytics {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    writer: Arc<Mutex<()>>,
    max_entries: usize,
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }
}

impl Analytics {
    pub const DEFAULT_MAX_ENTRIES: usize = 500;

    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            writer: Arc::new(Mutex::new(())),
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        }
    }

    /// Caps the stored log, dropping the oldest metrics first.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Logs the metric and appends it to the stored log.
    pub fn track(&self, metric: Metric) {
        info!(name = %metric.name, value = %metric.value, "Analytics");
        if let Err(e) = self.append(metric) {
            error!(error = %e, "Analytics error");
        }
    }

    /// Reads the stored log, oldest first.
    pub fn history(&self) -> Result<Vec<RecordedMetric>, AutomationError> {
        match self.store.get(METRICS_KEY)? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| AutomationError::Storage(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    fn append(&self, metric: Metric) -> Result<(), AutomationError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut log = self.history()?;
        log.push(RecordedMetric {
            ts: self.clock.now().timestamp_millis(),
            metric,
        });
        if log.len() > self.max_entries {
            let excess = log.len() - self.max_entries;
            log.drain(..excess);
        }
        let raw = serde_json::to_string(&log).map_err(|e| AutomationError::Storage(e.to_string()))?;
        self.store.set(METRICS_KEY, raw)
    }
}
