//! Page automation for Rust.
//!
//! Compose clicks, form submissions, navigations and content swaps into a
//! [`WorkflowEngine`], branch on page state with [`Condition`]s, and drive
//! everything through the [`AutomationApi`] façade.
//!
//! # Example
//!
//! ```rust
//! use karakuri::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let page = Arc::new(VirtualPage::new("https://example.com/").expect("valid url"));
//!     let form = page
//!         .append(None, Element::new("form").with_id("contact-form"))
//!         .expect("form appended");
//!     let email = page
//!         .append(Some(form), Element::new("input").with_attr("name", "email"))
//!         .expect("input appended");
//!
//!     let api = AutomationApi::builder(WorkflowContext::from_page(page.clone())).build();
//!     api.trigger_flow(
//!         FlowTrigger::builder(|engine| {
//!             engine.add_if(
//!                 ElementExists::new("#contact-form"),
//!                 FormSubmitAction::new("#contact-form", [("email", "john@example.com")]),
//!             )
//!         }),
//!         None,
//!     )
//!     .await;
//!
//!     assert_eq!(page.value(email).as_deref(), Some("john@example.com"));
//! }
//! ```

pub mod ab_test;
pub mod actions;
pub mod analytics;
pub mod api;
pub mod clock;
pub mod config;
mod engine;
pub mod links;
pub mod logging;
pub mod monitoring;
pub mod page;
mod retry;
pub mod status;

// Re-export core types
pub use karakuri_core::*;

pub use actions::{ClickAction, FormSubmitAction, NavigateAction, SetContentAction};
pub use api::{AutomationApi, AutomationApiBuilder, ExportFormat, FlowTrigger, PageEvent};
pub use config::AutomationConfig;
pub use engine::{RunReport, Step, StepOutcome, WorkflowEngine};
pub use page::{Element, VirtualPage};
pub use retry::{with_retry, RetryPolicy};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::condition::{fallible, from_async, predicate};
    pub use crate::{
        Action, ActionName, ActionResult, AutomationApi, AutomationConfig, AutomationError,
        ClickAction, Condition, Element, ElementExists, ExportFormat, FlowTrigger,
        FormSubmitAction, NavigateAction, PageEvent, RetryPolicy, RunReport, SetContentAction,
        StepOutcome, VirtualPage, WorkflowContext, WorkflowEngine,
    };
}
