//! Landing page flow against an in-memory page.

use karakuri::ab_test::{AbConfig, AbTestManager};
use karakuri::analytics::MemoryStore;
use karakuri::logging::{self, LogFormat};
use karakuri::monitoring::PerformanceMonitor;
use karakuri::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(LogFormat::Pretty)?;

    let page = Arc::new(VirtualPage::new("https://example.com/")?);
    let cta = page.append(None, Element::new("a").with_id("final-cta"))?;
    let form = page.append(None, Element::new("form").with_id("contact-form"))?;
    page.append(Some(form), Element::new("input").with_attr("name", "name"))?;
    page.append(Some(form), Element::new("input").with_attr("name", "email"))?;

    let store = Arc::new(MemoryStore::new());
    let variant = AbTestManager::new(AbConfig::default(), store).choose_variant();
    let label = variant.cta_text();
    let monitor = PerformanceMonitor::new();
    monitor.mark("cta_flow");

    let api = AutomationApi::builder(WorkflowContext::from_page(page.clone()))
        .config(AutomationConfig::from_env()?)
        .register_flow("contact", |engine| {
            engine
                .add_if_else(
                    ElementExists::new("#contact-form"),
                    FormSubmitAction::new(
                        "#contact-form",
                        [("name", "John Doe"), ("email", "john@example.com")],
                    ),
                    NavigateAction::new("#contact"),
                )
                .add_action(NavigateAction::new("#thanks"))
        })
        .build();

    let report = api
        .trigger_flow(
            FlowTrigger::builder(move |engine| {
                engine
                    .add_action(SetContentAction::text("#final-cta", label))
                    .add_action(ClickAction::new("#final-cta"))
            }),
            None,
        )
        .await;
    monitor.measure("cta_flow");
    monitor.report_interaction("final_cta", report.as_ref().is_some_and(|r| r.failure_count() == 0));
    println!("CTA flow: {report:?}");

    let params = json!({"source": "landing"}).as_object().cloned();
    if let Some(report) = api.trigger_flow("contact", params).await {
        println!("Contact flow failures: {}", report.failure_count());
    }

    println!("Variant {variant}: CTA clicked {} time(s)", page.click_count(cta));
    println!("Location: {}", page.location());

    let rows = json!([{"variant": variant.as_str(), "clicks": page.click_count(cta)}]);
    let file = api.export_data(ExportFormat::Csv, &rows)?;
    println!("{}:\n{}", file.file_name, file.contents);

    Ok(())
}
