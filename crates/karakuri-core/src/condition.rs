//! Predicates over page state used to branch a workflow.

use crate::context::WorkflowContext;
use crate::error::AutomationError;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;

/// A predicate evaluated against the live page.
///
/// Conditions may resolve immediately or after awaiting something. An `Err`
/// is treated by the engine as a step error, not as `false`.
///
/// # Examples
///
/// ```
/// use karakuri_core::condition::{predicate, Condition};
/// use karakuri_core::WorkflowContext;
///
/// let always = predicate(|_ctx: &WorkflowContext| true);
/// # let _ = always;
/// ```
#[async_trait]
pub trait Condition: Send + Sync {
    /// Evaluates the condition.
    async fn evaluate(&self, ctx: &WorkflowContext) -> Result<bool, AutomationError>;
}

#[async_trait]
impl<C: Condition + ?Sized> Condition for Box<C> {
    async fn evaluate(&self, ctx: &WorkflowContext) -> Result<bool, AutomationError> {
        (**self).evaluate(ctx).await
    }
}

/// A synchronous, infallible condition. Created by [`predicate`].
pub struct Predicate<F>(F);

/// Wraps a synchronous closure as a condition.
pub fn predicate<F>(f: F) -> Predicate<F>
where
    F: Fn(&WorkflowContext) -> bool + Send + Sync,
{
    Predicate(f)
}

#[async_trait]
impl<F> Condition for Predicate<F>
where
    F: Fn(&WorkflowContext) -> bool + Send + Sync,
{
    async fn evaluate(&self, ctx: &WorkflowContext) -> Result<bool, AutomationError> {
        Ok((self.0)(ctx))
    }
}

impl<F> fmt::Debug for Predicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

/// A synchronous condition that may fail. Created by [`fallible`].
pub struct Fallible<F>(F);

/// Wraps a synchronous, fallible closure as a condition.
pub fn fallible<F>(f: F) -> Fallible<F>
where
    F: Fn(&WorkflowContext) -> Result<bool, AutomationError> + Send + Sync,
{
    Fallible(f)
}

#[async_trait]
impl<F> Condition for Fallible<F>
where
    F: Fn(&WorkflowContext) -> Result<bool, AutomationError> + Send + Sync,
{
    async fn evaluate(&self, ctx: &WorkflowContext) -> Result<bool, AutomationError> {
        (self.0)(ctx)
    }
}

impl<F> fmt::Debug for Fallible<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fallible")
    }
}

/// An asynchronous condition. Created by [`from_async`].
///
/// The closure receives an owned clone of the context so the returned
/// future can hold on to it.
pub struct AsyncCondition<F>(F);

/// Wraps a closure returning a future as a condition.
pub fn from_async<F, Fut>(f: F) -> AsyncCondition<F>
where
    F: Fn(WorkflowContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, AutomationError>> + Send,
{
    AsyncCondition(f)
}

#[async_trait]
impl<F, Fut> Condition for AsyncCondition<F>
where
    F: Fn(WorkflowContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, AutomationError>> + Send,
{
    async fn evaluate(&self, ctx: &WorkflowContext) -> Result<bool, AutomationError> {
        (self.0)(ctx.clone()).await
    }
}

impl<F> fmt::Debug for AsyncCondition<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncCondition")
    }
}

/// True when the selector matches at least one element.
#[derive(Debug, Clone)]
pub struct ElementExists {
    selector: String,
}

impl ElementExists {
    /// Creates the condition for `selector`.
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl Condition for ElementExists {
    async fn evaluate(&self, ctx: &WorkflowContext) -> Result<bool, AutomationError> {
        Ok(ctx.document().query_selector(&self.selector)?.is_some())
    }
}
