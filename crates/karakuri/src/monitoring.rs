//! Lightweight timing marks and interaction reports.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Named timing marks, reported through `tracing`.
///
/// A mark stays in place after it is measured, so the same mark can be
/// measured repeatedly. Marking again restarts it.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    marks: Mutex<HashMap<String, Instant>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the current instant under `name`.
    pub fn mark(&self, name: &str) {
        self.marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Instant::now());
        debug!(name, "Performance mark");
    }

    /// Returns the time elapsed since `name` was marked, if it was.
    pub fn measure(&self, name: &str) -> Option<Duration> {
        let start = *self
            .marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)?;
        let duration = start.elapsed();
        info!(name, duration = ?duration, "Performance measure");
        Some(duration)
    }

    /// Logs the outcome of a user-facing interaction.
    pub fn report_interaction(&self, name: &str, success: bool) {
        info!(name, success, "Interaction");
    }
}
