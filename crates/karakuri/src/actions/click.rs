use async_trait::async_trait;
use karakuri_core::{Action, ActionName, ActionResult, AutomationError, WorkflowContext};
use tracing::info;

/// Clicks the first element matching a selector.
#[derive(Debug, Clone)]
pub struct ClickAction {
    selector: String,
}

impl ClickAction {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    fn click(&self, ctx: &WorkflowContext) -> Result<(), AutomationError> {
        let document = ctx.document();
        let element = document
            .query_selector(&self.selector)?
            .ok_or_else(|| AutomationError::ElementNotFound(self.selector.clone()))?;
        document.click(element)?;
        info!(selector = %self.selector, "Clicked element");
        Ok(())
    }
}

#[async_trait]
impl Action for ClickAction {
    fn name(&self) -> ActionName {
        ActionName::new("ClickAction")
    }

    async fn run(&self, ctx: &WorkflowContext) -> ActionResult {
        self.click(ctx).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{Element, VirtualPage};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_click_existing_element() {
        let page = Arc::new(VirtualPage::new("https://example.com/").unwrap());
        let button = page
            .append(None, Element::new("button").with_attr("data-action", "signup"))
            .unwrap();
        let ctx = WorkflowContext::from_page(page.clone());

        let result = ClickAction::new("button[data-action=\"signup\"]").run(&ctx).await;
        assert_eq!(result, ActionResult::Success);
        assert_eq!(page.click_count(button), 1);
    }

    #[tokio::test]
    async fn test_click_missing_element() {
        let page = Arc::new(VirtualPage::new("https://example.com/").unwrap());
        let ctx = WorkflowContext::from_page(page);

        let result = ClickAction::new("#missing").run(&ctx).await;
        assert_eq!(result, ActionResult::failure("Element not found: #missing"));
    }

    #[tokio::test]
    async fn test_malformed_selector_is_reported() {
        let page = Arc::new(VirtualPage::new("https://example.com/").unwrap());
        let ctx = WorkflowContext::from_page(page);

        let result = ClickAction::new("div > p").run(&ctx).await;
        assert_eq!(result.error(), Some("'div > p' is not a valid selector"));
    }
}
