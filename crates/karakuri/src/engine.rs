//! Sequential workflow engine.

use futures::FutureExt;
use karakuri_core::{Action, ActionName, ActionResult, AutomationError, Condition, WorkflowContext};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One unit of sequencing owned by a [`WorkflowEngine`].
pub enum Step {
    /// Run an action.
    Action(Box<dyn Action>),
    /// Evaluate a condition and run the matching branch, if present.
    Conditional {
        condition: Box<dyn Condition>,
        when_true: Option<Box<dyn Action>>,
        when_false: Option<Box<dyn Action>>,
    },
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Action(action) => f.debug_tuple("Action").field(&action.name()).finish(),
            Step::Conditional {
                when_true,
                when_false,
                ..
            } => f
                .debug_struct("Conditional")
                .field("when_true", &when_true.as_ref().map(|a| a.name()))
                .field("when_false", &when_false.as_ref().map(|a| a.name()))
                .finish(),
        }
    }
}

/// What happened to a single step during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The action reported success.
    Completed { action: ActionName },
    /// The action reported failure. The run carried on.
    Failed { action: ActionName, error: String },
    /// A conditional step had no branch for the evaluated result.
    Skipped,
    /// The condition failed or the step panicked. The run carried on.
    Errored { details: String },
}

/// Summary of a [`WorkflowEngine::run`].
///
/// Outcomes are listed in step order. Steps that never started because the
/// run was cancelled are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    outcomes: Vec<StepOutcome>,
    cancelled: bool,
}

impl RunReport {
    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    /// Returns `true` if the run stopped because its token was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Names of the actions that completed successfully, in execution order.
    pub fn completed_actions(&self) -> Vec<&ActionName> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                StepOutcome::Completed { action } => Some(action),
                _ => None,
            })
            .collect()
    }

    /// Number of steps that failed or errored.
    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, StepOutcome::Failed { .. } | StepOutcome::Errored { .. }))
            .count()
    }
}

/// An ordered list of steps executed one at a time.
///
/// The engine is a best-effort sequencer: a failing, erroring or panicking
/// step is logged and the run moves on to the next one. Nothing escapes
/// [`run`](Self::run).
///
/// Steps can only be appended while the engine is owned, so the step list is
/// fixed for the duration of any run.
///
/// # Examples
///
/// ```
/// use karakuri::prelude::*;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let page = Arc::new(VirtualPage::new("https://example.com/").expect("valid url"));
/// let ctx = WorkflowContext::from_page(page.clone());
///
/// let engine = WorkflowEngine::new()
///     .add_action(ClickAction::new("#signup"))
///     .add_if_else(
///         ElementExists::new("#contact-form"),
///         FormSubmitAction::new("#contact-form", [("email", "john@example.com")]),
///         NavigateAction::new("#pricing"),
///     );
///
/// let report = engine.run(&ctx).await;
/// assert_eq!(report.outcomes().len(), 2);
/// assert_eq!(page.location().fragment(), Some("pricing"));
/// # }
/// ```
#[derive(Default)]
pub struct WorkflowEngine {
    steps: Vec<Step>,
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("steps", &self.steps)
            .finish()
    }
}

impl WorkflowEngine {
    /// Creates an engine with no steps.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Appends an action step.
    pub fn add_action<A: Action + 'static>(mut self, action: A) -> Self {
        self.steps.push(Step::Action(Box::new(action)));
        self
    }

    /// Appends a conditional step with optional branches.
    pub fn add_conditional<C: Condition + 'static>(
        mut self,
        condition: C,
        when_true: Option<Box<dyn Action>>,
        when_false: Option<Box<dyn Action>>,
    ) -> Self {
        self.steps.push(Step::Conditional {
            condition: Box::new(condition),
            when_true,
            when_false,
        });
        self
    }

    /// Appends a conditional step that only acts when the condition holds.
    pub fn add_if<C, A>(self, condition: C, action: A) -> Self
    where
        C: Condition + 'static,
        A: Action + 'static,
    {
        self.add_conditional(condition, Some(Box::new(action)), None)
    }

    /// Appends a conditional step with both branches.
    pub fn add_if_else<C, T, F>(self, condition: C, when_true: T, when_false: F) -> Self
    where
        C: Condition + 'static,
        T: Action + 'static,
        F: Action + 'static,
    {
        self.add_conditional(
            condition,
            Some(Box::new(when_true)),
            Some(Box::new(when_false)),
        )
    }

    /// Returns the steps in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the engine has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in insertion order against `ctx`.
    pub async fn run(&self, ctx: &WorkflowContext) -> RunReport {
        self.execute(ctx, None).await
    }

    /// Runs the steps until they are exhausted or `token` is cancelled.
    ///
    /// The token is checked before each step and raced against every awaited
    /// action or condition. Cancellation ends the run without an error.
    pub async fn run_until_cancelled(
        &self,
        ctx: &WorkflowContext,
        token: &CancellationToken,
    ) -> RunReport {
        self.execute(ctx, Some(token)).await
    }

    async fn execute(&self, ctx: &WorkflowContext, token: Option<&CancellationToken>) -> RunReport {
        let total = self.steps.len();
        let mut report = RunReport::default();
        info!(steps = total, "Workflow started");

        for (index, step) in self.steps.iter().enumerate() {
            let guarded = AssertUnwindSafe(self.execute_step(index, total, step, ctx)).catch_unwind();
            let result = match token {
                Some(token) if token.is_cancelled() => None,
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    result = guarded => Some(result),
                },
                None => Some(guarded.await),
            };

            let outcome = match result {
                Some(Ok(Ok(outcome))) => outcome,
                Some(Ok(Err(e))) => {
                    error!(step_index = index, error = %e, "Workflow step error");
                    StepOutcome::Errored {
                        details: e.to_string(),
                    }
                }
                Some(Err(panic)) => {
                    let details = panic_message(panic.as_ref());
                    error!(step_index = index, error = %details, "Workflow step error");
                    StepOutcome::Errored { details }
                }
                None => {
                    info!(step_index = index, "Workflow cancelled");
                    report.cancelled = true;
                    return report;
                }
            };
            report.outcomes.push(outcome);
        }

        info!("Workflow completed");
        report
    }

    async fn execute_step(
        &self,
        index: usize,
        total: usize,
        step: &Step,
        ctx: &WorkflowContext,
    ) -> Result<StepOutcome, AutomationError> {
        match step {
            Step::Action(action) => {
                debug!(action = %action.name(), "Running action {}/{}", index + 1, total);
                Ok(run_action(action.as_ref(), ctx, "Action failed").await)
            }
            Step::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                let result = condition.evaluate(ctx).await?;
                debug!(result, "Conditional evaluated");
                let branch = if result { when_true } else { when_false };
                match branch {
                    Some(action) => {
                        Ok(run_action(action.as_ref(), ctx, "Conditional action failed").await)
                    }
                    None => Ok(StepOutcome::Skipped),
                }
            }
        }
    }
}

async fn run_action(action: &dyn Action, ctx: &WorkflowContext, failure: &str) -> StepOutcome {
    let name = action.name();
    match action.run(ctx).await {
        ActionResult::Success => StepOutcome::Completed { action: name },
        ActionResult::Failure { error } => {
            warn!(action = %name, error = %error, "{}", failure);
            StepOutcome::Failed {
                action: name,
                error,
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "step panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::VirtualPage;
    use async_trait::async_trait;
    use karakuri_core::condition::{fallible, from_async, predicate};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Journal = Arc<Mutex<Vec<String>>>;

    #[derive(Debug)]
    struct Record {
        label: &'static str,
        journal: Journal,
        succeed: bool,
    }

    impl Record {
        fn ok(label: &'static str, journal: &Journal) -> Self {
            Self {
                label,
                journal: journal.clone(),
                succeed: true,
            }
        }

        fn failing(label: &'static str, journal: &Journal) -> Self {
            Self {
                succeed: false,
                ..Self::ok(label, journal)
            }
        }
    }

    #[async_trait]
    impl Action for Record {
        fn name(&self) -> ActionName {
            ActionName::new(self.label)
        }

        async fn run(&self, _ctx: &WorkflowContext) -> ActionResult {
            self.journal.lock().unwrap().push(self.label.to_string());
            if self.succeed {
                ActionResult::success()
            } else {
                ActionResult::failure(format!("{} broke", self.label))
            }
        }
    }

    #[derive(Debug)]
    struct Panics;

    #[async_trait]
    impl Action for Panics {
        fn name(&self) -> ActionName {
            ActionName::new("Panics")
        }

        async fn run(&self, _ctx: &WorkflowContext) -> ActionResult {
            panic!("selector engine exploded")
        }
    }

    fn context() -> WorkflowContext {
        WorkflowContext::from_page(Arc::new(VirtualPage::new("https://example.com/").unwrap()))
    }

    fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_runs_steps_in_insertion_order() {
        let journal = journal();
        let engine = WorkflowEngine::new()
            .add_action(Record::ok("first", &journal))
            .add_action(Record::ok("second", &journal))
            .add_action(Record::ok("third", &journal));

        let report = engine.run(&context()).await;

        assert_eq!(*journal.lock().unwrap(), vec!["first", "second", "third"]);
        let names: Vec<&str> = report.completed_actions().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert!(!report.is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_action_does_not_stop_run() {
        let journal = journal();
        let engine = WorkflowEngine::new()
            .add_action(Record::failing("broken", &journal))
            .add_action(Record::ok("after", &journal));

        let report = engine.run(&context()).await;

        assert_eq!(*journal.lock().unwrap(), vec!["broken", "after"]);
        assert_eq!(
            report.outcomes()[0],
            StepOutcome::Failed {
                action: ActionName::new("broken"),
                error: "broken broke".to_string(),
            }
        );
        assert_eq!(report.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_conditional_branches() {
        let journal = journal();
        let engine = WorkflowEngine::new()
            .add_if_else(
                predicate(|_: &WorkflowContext| true),
                Record::ok("yes", &journal),
                Record::ok("no", &journal),
            )
            .add_if_else(
                predicate(|_: &WorkflowContext| false),
                Record::ok("yes", &journal),
                Record::ok("no", &journal),
            );

        engine.run(&context()).await;
        assert_eq!(*journal.lock().unwrap(), vec!["yes", "no"]);
    }

    #[tokio::test]
    async fn test_missing_branch_is_skipped() {
        let journal = journal();
        let engine = WorkflowEngine::new().add_conditional(
            predicate(|_: &WorkflowContext| true),
            None,
            Some(Box::new(Record::ok("otherwise", &journal))),
        );

        let report = engine.run(&context()).await;
        assert!(journal.lock().unwrap().is_empty());
        assert_eq!(report.outcomes(), &[StepOutcome::Skipped]);
    }

    #[tokio::test]
    async fn test_async_condition() {
        let journal = journal();
        let engine = WorkflowEngine::new().add_if(
            from_async(|_ctx| async {
                tokio::task::yield_now().await;
                Ok(true)
            }),
            Record::ok("deferred", &journal),
        );

        engine.run(&context()).await;
        assert_eq!(*journal.lock().unwrap(), vec!["deferred"]);
    }

    #[tokio::test]
    async fn test_condition_error_is_contained() {
        let journal = journal();
        let engine = WorkflowEngine::new()
            .add_if(
                fallible(|_: &WorkflowContext| {
                    Err(AutomationError::Condition("flag service down".to_string()))
                }),
                Record::ok("guarded", &journal),
            )
            .add_action(Record::ok("next", &journal));

        let report = engine.run(&context()).await;
        assert_eq!(*journal.lock().unwrap(), vec!["next"]);
        assert_eq!(
            report.outcomes()[0],
            StepOutcome::Errored {
                details: "Condition failed: flag service down".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_panicking_step_is_contained() {
        let journal = journal();
        let engine = WorkflowEngine::new()
            .add_action(Panics)
            .add_action(Record::ok("survivor", &journal));

        let report = engine.run(&context()).await;
        assert_eq!(*journal.lock().unwrap(), vec!["survivor"]);
        assert_eq!(
            report.outcomes()[0],
            StepOutcome::Errored {
                details: "selector engine exploded".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let journal = journal();
        let engine = WorkflowEngine::new().add_action(Record::ok("never", &journal));
        let token = CancellationToken::new();
        token.cancel();

        let report = engine.run_until_cancelled(&context(), &token).await;
        assert!(report.is_cancelled());
        assert!(report.outcomes().is_empty());
        assert!(journal.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_hung_condition() {
        let journal = journal();
        let engine = WorkflowEngine::new()
            .add_action(Record::ok("before", &journal))
            .add_if(
                from_async(|_ctx| std::future::pending::<Result<bool, AutomationError>>()),
                Record::ok("never", &journal),
            )
            .add_action(Record::ok("after", &journal));
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let report = engine.run_until_cancelled(&context(), &token).await;
        assert!(report.is_cancelled());
        assert_eq!(*journal.lock().unwrap(), vec!["before"]);
        assert_eq!(report.outcomes().len(), 1);
    }

    #[test]
    fn test_engine_len() {
        let engine = WorkflowEngine::new();
        assert!(engine.is_empty());
        let engine = engine.add_action(crate::actions::ClickAction::new("#a"));
        assert_eq!(engine.len(), 1);
        assert!(matches!(engine.steps()[0], Step::Action(_)));
    }
}
