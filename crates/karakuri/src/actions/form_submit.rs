use async_trait::async_trait;
use karakuri_core::{Action, ActionName, ActionResult, AutomationError, DomEvent, WorkflowContext};
use tracing::{debug, info};

/// Fills a form and dispatches a bubbling `submit` event on it.
///
/// Fields are assigned in the order they were given. A field name with no
/// matching input inside the form is skipped. Success is reported as soon as
/// the event has been dispatched; navigation or network activity triggered by
/// listeners is not awaited.
#[derive(Debug, Clone)]
pub struct FormSubmitAction {
    form_selector: String,
    fields: Vec<(String, String)>,
}

impl FormSubmitAction {
    pub fn new<I, K, V>(form_selector: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            form_selector: form_selector.into(),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn submit(&self, ctx: &WorkflowContext) -> Result<(), AutomationError> {
        let document = ctx.document();
        let form = document
            .query_selector(&self.form_selector)?
            .ok_or_else(|| AutomationError::FormNotFound(self.form_selector.clone()))?;

        for (name, value) in &self.fields {
            match document.query_selector_within(form, &format!("[name=\"{name}\"]"))? {
                Some(input) => document.set_value(input, value)?,
                None => debug!(form = %self.form_selector, field = %name, "Form field not present"),
            }
        }

        document.dispatch_event(form, &DomEvent::submit())?;
        info!(form = %self.form_selector, "Form submitted");
        Ok(())
    }
}

#[async_trait]
impl Action for FormSubmitAction {
    fn name(&self) -> ActionName {
        ActionName::new("FormSubmitAction")
    }

    async fn run(&self, ctx: &WorkflowContext) -> ActionResult {
        self.submit(ctx).into()
    }
}
