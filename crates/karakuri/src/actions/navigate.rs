use async_trait::async_trait;
use karakuri_core::{Action, ActionName, ActionResult, AutomationError, WorkflowContext};
use tracing::info;

/// Navigates to a URL, or to an in-page anchor when the target starts with `#`.
///
/// Success is reported as soon as the navigation has been requested.
#[derive(Debug, Clone)]
pub struct NavigateAction {
    target: String,
}

impl NavigateAction {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    fn navigate(&self, ctx: &WorkflowContext) -> Result<(), AutomationError> {
        if self.target.starts_with('#') {
            ctx.window().set_location_hash(&self.target)?;
        } else {
            ctx.window().set_location_href(&self.target)?;
        }
        info!(destination = %self.target, "Navigated");
        Ok(())
    }
}

#[async_trait]
impl Action for NavigateAction {
    fn name(&self) -> ActionName {
        ActionName::new("NavigateAction")
    }

    async fn run(&self, ctx: &WorkflowContext) -> ActionResult {
        self.navigate(ctx).into()
    }
}
