//! The automation façade.
//!
//! [`AutomationApi`] is the single surface the rest of an application uses to
//! drive or observe automation. It runs ad-hoc and registered workflows,
//! rebroadcasts flow triggers and backend webhooks as [`PageEvent`]s, forwards
//! them to a backend when one is configured, and exports data as files.

mod events;
mod export;
mod forward;

pub use events::{
    EventBus, EventReceiver, FlowDetail, PageEvent, TriggerPayload, WebhookDetail, FLOW_EVENT,
    WEBHOOK_EVENT,
};
pub use export::{export_file, render, to_csv, ExportFormat};
pub use forward::{EventForwarder, ForwardEnvelope, HttpForwarder};

use crate::analytics::{Analytics, Metric, MemoryStore};
use crate::clock::{Clock, SystemClock};
use crate::config::AutomationConfig;
use crate::engine::{RunReport, WorkflowEngine};
use karakuri_core::{AutomationError, FileDownload, WorkflowContext};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// A reusable workflow definition stored in the flow registry.
pub type FlowBuilder = Arc<dyn Fn(WorkflowEngine) -> WorkflowEngine + Send + Sync>;

/// What [`AutomationApi::trigger_flow`] should do.
pub enum FlowTrigger {
    /// Broadcast and forward a named flow, running it if it is registered.
    Named(String),
    /// Populate a fresh engine and run it against the page.
    Builder(Box<dyn FnOnce(WorkflowEngine) -> WorkflowEngine + Send>),
}

impl FlowTrigger {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn builder<F>(build: F) -> Self
    where
        F: FnOnce(WorkflowEngine) -> WorkflowEngine + Send + 'static,
    {
        Self::Builder(Box::new(build))
    }
}

impl From<&str> for FlowTrigger {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for FlowTrigger {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Debug for FlowTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowTrigger::Named(name) => f.debug_tuple("Named").field(name).finish(),
            FlowTrigger::Builder(_) => f.write_str("Builder"),
        }
    }
}

/// The automation façade.
///
/// Configuration and collaborators are fixed at construction. Failures inside
/// the façade are logged and never reach the caller, except for
/// [`export_data`](Self::export_data) which reports them.
///
/// # Examples
///
/// ```
/// use karakuri::prelude::*;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let page = Arc::new(VirtualPage::new("https://example.com/").expect("valid url"));
/// let api = AutomationApi::builder(WorkflowContext::from_page(page)).build();
/// let mut events = api.subscribe();
///
/// let params = json!({"source": "widget"}).as_object().cloned();
/// api.trigger_flow("sample_flow", params).await;
///
/// let event = events.try_recv().expect("event was broadcast");
/// assert_eq!(event.event_type(), "automation:flow");
/// # }
/// ```
pub struct AutomationApi {
    context: WorkflowContext,
    config: AutomationConfig,
    bus: EventBus,
    analytics: Analytics,
    forwarder: Arc<dyn EventForwarder>,
    clock: Arc<dyn Clock>,
    flows: HashMap<String, FlowBuilder>,
}

impl fmt::Debug for AutomationApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomationApi")
            .field("config", &self.config)
            .field("flows", &self.flows.keys().collect::<Vec<_>>())
            .field("forwarder", &self.forwarder)
            .finish_non_exhaustive()
    }
}

impl AutomationApi {
    /// Creates a builder bound to the given page.
    pub fn builder(context: WorkflowContext) -> AutomationApiBuilder {
        AutomationApiBuilder::new(context)
    }

    /// Subscribes to `automation:flow` and `automation:webhook` events.
    ///
    /// Every event published after this call is delivered, however slowly the
    /// receiver is drained.
    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe()
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    /// Returns `true` if a flow is registered under `name`.
    pub fn has_flow(&self, name: &str) -> bool {
        self.flows.contains_key(name)
    }

    /// Triggers a flow.
    ///
    /// With [`FlowTrigger::Builder`] a fresh engine is populated by the
    /// closure and run against the page; `params` is ignored.
    ///
    /// With [`FlowTrigger::Named`] the trigger is recorded, an
    /// `automation:flow` event carrying `{name, params}` is broadcast before
    /// anything is awaited, and the event is forwarded to the backend in the
    /// background. If a flow is registered under that name it is run as well.
    ///
    /// Returns the report of whichever workflow ran, if any.
    pub async fn trigger_flow(
        &self,
        trigger: impl Into<FlowTrigger>,
        params: Option<TriggerPayload>,
    ) -> Option<RunReport> {
        match trigger.into() {
            FlowTrigger::Builder(build) => {
                let engine = build_engine(|| build(WorkflowEngine::new()))?;
                let report = engine.run(&self.context).await;
                self.analytics.track(Metric::new("flow_triggered", true));
                Some(report)
            }
            FlowTrigger::Named(name) => {
                self.analytics
                    .track(Metric::new("flow_triggered", name.as_str()));
                self.bus.publish(PageEvent::Flow(FlowDetail {
                    name: name.clone(),
                    params: params.clone(),
                }));
                self.forward(&name, params);

                let build = self.flows.get(&name)?;
                debug!(flow = %name, "Running registered flow");
                let engine = build_engine(|| build(WorkflowEngine::new()))?;
                Some(engine.run(&self.context).await)
            }
        }
    }

    /// Injects an externally originated event into the page.
    ///
    /// Subscribers registered before the call observe the event by the time
    /// it returns. Forwarding happens in the background.
    pub fn webhook_event(&self, event: &str, payload: Option<TriggerPayload>) {
        info!(event, payload = ?payload, "Webhook received");
        self.analytics
            .track(Metric::new(format!("webhook_{event}"), true));
        self.bus.publish(PageEvent::Webhook(WebhookDetail {
            event: event.to_string(),
            payload: payload.clone(),
        }));
        self.forward(event, payload);
    }

    /// Serializes `data` and offers it to the window as a download.
    pub fn export_data(
        &self,
        format: ExportFormat,
        data: &Value,
    ) -> Result<FileDownload, AutomationError> {
        let file = export_file(format, data)?;
        self.context.window().download(&file)?;
        self.analytics
            .track(Metric::new("data_export", format.to_string()));
        Ok(file)
    }

    /// Posts the event to the backend in a detached task.
    ///
    /// No URL configured, no runtime available, a failed request and a timeout
    /// are all silent from the caller's point of view.
    fn forward(&self, event: &str, metadata: Option<TriggerPayload>) {
        let Some(url) = self.config.backend_events_url.clone() else {
            debug!(event, "No backend events URL configured");
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            debug!(event, "No async runtime, event not forwarded");
            return;
        };

        let envelope = ForwardEnvelope::new(event, metadata, self.clock.now());
        let forwarder = self.forwarder.clone();
        let limit = self.config.forward_timeout();
        runtime.spawn(async move {
            match tokio::time::timeout(limit, forwarder.forward(&url, &envelope)).await {
                Ok(Ok(())) => debug!(event = %envelope.event, "Event forwarded"),
                Ok(Err(e)) => debug!(event = %envelope.event, error = %e, "Backend post failed"),
                Err(_) => debug!(
                    event = %envelope.event,
                    timeout = ?limit,
                    "Backend post timed out"
                ),
            }
        });
    }
}

/// Runs a flow builder, turning a panic into a logged `None`.
fn build_engine<F>(build: F) -> Option<WorkflowEngine>
where
    F: FnOnce() -> WorkflowEngine,
{
    match panic::catch_unwind(AssertUnwindSafe(build)) {
        Ok(engine) => Some(engine),
        Err(_) => {
            warn!("triggerFlow failed: flow builder panicked");
            None
        }
    }
}

/// Builder for [`AutomationApi`].
pub struct AutomationApiBuilder {
    context: WorkflowContext,
    config: AutomationConfig,
    analytics: Option<Analytics>,
    forwarder: Option<Arc<dyn EventForwarder>>,
    clock: Option<Arc<dyn Clock>>,
    flows: HashMap<String, FlowBuilder>,
}

impl AutomationApiBuilder {
    pub fn new(context: WorkflowContext) -> Self {
        Self {
            context,
            config: AutomationConfig::default(),
            analytics: None,
            forwarder: None,
            clock: None,
            flows: HashMap::new(),
        }
    }

    pub fn config(mut self, config: AutomationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn analytics(mut self, analytics: Analytics) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Replaces the default [`HttpForwarder`].
    pub fn forwarder<F: EventForwarder + 'static>(mut self, forwarder: F) -> Self {
        self.forwarder = Some(Arc::new(forwarder));
        self
    }

    /// Replaces the wall clock used to stamp forwarded events and metrics.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Registers a workflow to run whenever `name` is triggered.
    pub fn register_flow<F>(mut self, name: impl Into<String>, build: F) -> Self
    where
        F: Fn(WorkflowEngine) -> WorkflowEngine + Send + Sync + 'static,
    {
        self.flows.insert(name.into(), Arc::new(build));
        self
    }

    pub fn build(self) -> AutomationApi {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let analytics = self
            .analytics
            .unwrap_or_else(|| Analytics::new(Arc::new(MemoryStore::new()), clock.clone()));
        let forwarder = self
            .forwarder
            .unwrap_or_else(|| Arc::new(HttpForwarder::new()));
        info!(flows = self.flows.len(), "AutomationApi ready");
        AutomationApi {
            context: self.context,
            config: self.config,
            bus: EventBus::new(),
            analytics,
            forwarder,
            clock,
            flows: self.flows,
        }
    }
}
