//! Core traits and types for the karakuri page automation engine.
//!
//! This crate holds the contracts only and carries no runtime. Depend on it to
//! write custom actions, conditions or UI roots.
//!
//! # Core Types
//!
//! - [`Action`] - A named unit of UI manipulation
//! - [`ActionResult`] - Outcome of one action invocation
//! - [`Condition`] - Predicate over page state used for branching
//! - [`WorkflowContext`] - The live page a workflow runs against
//! - [`Document`] / [`Window`] - Capabilities a UI root provides
//! - [`AutomationError`] - Error types for automation

mod action;
pub mod condition;
mod context;
mod error;

pub use action::{Action, ActionName, ActionResult};
pub use condition::{Condition, ElementExists};
pub use context::{Document, DomEvent, FileDownload, NodeId, Window, WorkflowContext};
pub use error::{AutomationError, DomError};
