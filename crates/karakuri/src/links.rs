//! Broken link detection.
//!
//! [`LinkChecker`] sends a `HEAD` request for every same-origin `a[href]` on
//! the page. Cross-origin and non-HTTP links are left alone.

use futures::future::join_all;
use karakuri_core::{AutomationError, DomError, WorkflowContext};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of [`LinkChecker::check_all`]. Links are reported as written in
/// the page, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Links that were requested.
    pub checked: Vec<String>,
    /// Links that failed or answered with a non-2xx status.
    pub broken: Vec<String>,
}

impl LinkReport {
    pub fn is_healthy(&self) -> bool {
        self.broken.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LinkChecker {
    client: reqwest::Client,
}

impl LinkChecker {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Result<Self, AutomationError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AutomationError::Configuration(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Checks every same-origin link on the page concurrently.
    pub async fn check_all(&self, ctx: &WorkflowContext) -> Result<LinkReport, AutomationError> {
        let location = ctx.window().href();
        let base = Url::parse(&location).map_err(|e| DomError::Navigation {
            target: location.clone(),
            details: e.to_string(),
        })?;

        let document = ctx.document();
        let mut targets = Vec::new();
        for anchor in document.query_selector_all("a[href]")? {
            let Some(href) = document.attribute(anchor, "href")? else {
                continue;
            };
            match base.join(&href) {
                Ok(url) if !matches!(url.scheme(), "http" | "https") => {
                    debug!(href = %href, "Skipping non-HTTP link");
                }
                Ok(url) if url.origin() != base.origin() => {
                    debug!(href = %href, "Skipping cross-origin link");
                }
                resolved => targets.push((href, resolved.ok())),
            }
        }

        let results = join_all(targets.iter().map(|(_, url)| self.is_reachable(url.as_ref()))).await;
        let mut report = LinkReport::default();
        for ((href, _), reachable) in targets.into_iter().zip(results) {
            if !reachable {
                report.broken.push(href.clone());
            }
            report.checked.push(href);
        }

        if report.is_healthy() {
            info!(checked = report.checked.len(), "No broken links");
        } else {
            warn!(broken = ?report.broken, "Broken links found");
        }
        Ok(report)
    }

    async fn is_reachable(&self, url: Option<&Url>) -> bool {
        let Some(url) = url else {
            return false;
        };
        match self.client.head(url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "Link request failed");
                false
            }
        }
    }
}
