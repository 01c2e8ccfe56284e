//! Action trait and related types.

use crate::context::WorkflowContext;
use crate::error::AutomationError;
use async_trait::async_trait;
use std::fmt::{self, Debug};

/// Human-readable action name.
///
/// Names describe what an action does; they are not required to be unique
/// within a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionName(String);

impl ActionName {
    /// Creates a new ActionName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the action name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActionName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActionName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ActionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of a single action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    /// The action did what it was asked to.
    Success,
    /// The action could not complete.
    Failure {
        /// Human-readable reason.
        error: String,
    },
}

impl ActionResult {
    /// Creates a successful result.
    pub fn success() -> Self {
        Self::Success
    }

    /// Creates a failed result with the given reason.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// Returns `true` for [`ActionResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns the failure reason, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure { error } => Some(error),
        }
    }
}

impl From<Result<(), AutomationError>> for ActionResult {
    fn from(result: Result<(), AutomationError>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

/// A named, independently runnable unit of UI manipulation.
///
/// Implementations must not fail by any other route than the returned
/// [`ActionResult`]: errors from the UI root are caught and reported as
/// [`ActionResult::Failure`].
///
/// # Examples
///
/// ```
/// use karakuri_core::{Action, ActionName, ActionResult, WorkflowContext};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct NoopAction;
///
/// #[async_trait]
/// impl Action for NoopAction {
///     fn name(&self) -> ActionName {
///         ActionName::new("NoopAction")
///     }
///
///     async fn run(&self, _ctx: &WorkflowContext) -> ActionResult {
///         ActionResult::success()
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync + Debug {
    /// Returns the action name.
    fn name(&self) -> ActionName;

    /// Runs the action against the page.
    async fn run(&self, ctx: &WorkflowContext) -> ActionResult;
}

#[async_trait]
impl<A: Action + ?Sized> Action for Box<A> {
    fn name(&self) -> ActionName {
        (**self).name()
    }

    async fn run(&self, ctx: &WorkflowContext) -> ActionResult {
        (**self).run(ctx).await
    }
}
