use async_trait::async_trait;
use karakuri_core::{Action, ActionName, ActionResult, AutomationError, WorkflowContext};
use tracing::info;

/// Replaces the text and/or markup of the first element matching a selector.
#[derive(Debug, Clone)]
pub struct SetContentAction {
    selector: String,
    text: Option<String>,
    html: Option<String>,
}

impl SetContentAction {
    /// Sets the text content of the target.
    pub fn text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: Some(text.into()),
            html: None,
        }
    }

    /// Sets the inner HTML of the target.
    pub fn html(selector: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: None,
            html: Some(html.into()),
        }
    }

    fn apply(&self, ctx: &WorkflowContext) -> Result<(), AutomationError> {
        let document = ctx.document();
        let element = document
            .query_selector(&self.selector)?
            .ok_or_else(|| AutomationError::ElementNotFound(self.selector.clone()))?;
        if let Some(text) = &self.text {
            document.set_text_content(element, text)?;
        }
        if let Some(html) = &self.html {
            document.set_inner_html(element, html)?;
        }
        info!(selector = %self.selector, "Content updated");
        Ok(())
    }
}

#[async_trait]
impl Action for SetContentAction {
    fn name(&self) -> ActionName {
        ActionName::new("SetContentAction")
    }

    async fn run(&self, ctx: &WorkflowContext) -> ActionResult {
        self.apply(ctx).into()
    }
}
