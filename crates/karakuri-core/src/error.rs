//! Automation error types.

use crate::context::NodeId;
use thiserror::Error;

/// Errors raised by a UI root while looking up or mutating elements.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DomError {
    /// The selector could not be parsed.
    #[error("'{0}' is not a valid selector")]
    InvalidSelector(String),

    /// The node handle does not belong to this document.
    #[error("Node {0} is not attached to the document")]
    StaleNode(NodeId),

    /// A navigation target could not be resolved.
    #[error("Cannot navigate to '{target}': {details}")]
    Navigation {
        /// The requested target.
        target: String,
        /// Why the navigation was refused.
        details: String,
    },

    /// The UI root does not support the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Errors that can occur while automating a page.
///
/// Most of these never leave the component that produced them: actions fold
/// them into an [`ActionResult`](crate::ActionResult), the engine logs them per
/// step, and the façade swallows forwarding failures.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AutomationError {
    /// No element matched the selector.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// No form matched the selector.
    #[error("Form not found: {0}")]
    FormNotFound(String),

    /// The UI root rejected an operation.
    #[error(transparent)]
    Dom(#[from] DomError),

    /// A condition could not be evaluated.
    #[error("Condition failed: {0}")]
    Condition(String),

    /// An event could not be forwarded to the backend.
    #[error("Forwarding failed: {0}")]
    Forwarding(String),

    /// Exported data could not be produced or handed to the window.
    #[error("Export failed: {0}")]
    Export(String),

    /// The local key-value store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The automation configuration is invalid.
    #[error("Invalid automation configuration: {0}")]
    Configuration(String),
}
