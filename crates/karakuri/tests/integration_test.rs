use async_trait::async_trait;
use karakuri::api::{FlowDetail, WebhookDetail};
use karakuri::prelude::*;
use karakuri::Document;
use karakuri::status::{HttpStatusSource, StatusPoller, STATUS_EVENT};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug)]
struct Record {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    succeed: bool,
}

#[async_trait]
impl Action for Record {
    async fn run(&self, _ctx: &WorkflowContext) -> ActionResult {
        self.log.lock().unwrap().push(self.label);
        if self.succeed {
            ActionResult::success()
        } else {
            ActionResult::failure(format!("{} failed", self.label))
        }
    }

    fn name(&self) -> ActionName {
        ActionName::new(self.label)
    }
}

fn record(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str, succeed: bool) -> Record {
    Record {
        label,
        log: log.clone(),
        succeed,
    }
}

fn landing_page() -> Arc<VirtualPage> {
    let page = Arc::new(VirtualPage::new("https://example.com/").expect("valid url"));
    let hero = page
        .append(None, Element::new("section").with_class("hero"))
        .expect("hero appended");
    page.append(Some(hero), Element::new("button").with_id("signup"))
        .expect("button appended");
    let form = page
        .append(None, Element::new("form").with_id("contact-form"))
        .expect("form appended");
    page.append(Some(form), Element::new("input").with_attr("name", "email"))
        .expect("input appended");
    page
}

#[tokio::test]
async fn test_actions_run_in_insertion_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = WorkflowEngine::new()
        .add_action(record(&log, "first", true))
        .add_action(record(&log, "second", true))
        .add_action(record(&log, "third", true));

    let report = engine
        .run(&WorkflowContext::from_page(landing_page()))
        .await;

    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    assert_eq!(report.completed_actions().len(), 3);
    assert_eq!(report.failure_count(), 0);
}

#[tokio::test]
async fn test_failed_action_does_not_stop_the_run() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = WorkflowEngine::new()
        .add_action(ClickAction::new("#missing"))
        .add_action(record(&log, "broken", false))
        .add_action(record(&log, "after", true));

    let report = engine
        .run(&WorkflowContext::from_page(landing_page()))
        .await;

    assert_eq!(*log.lock().unwrap(), vec!["broken", "after"]);
    assert_eq!(report.failure_count(), 2);
    assert_eq!(
        report.outcomes()[0],
        StepOutcome::Failed {
            action: ActionName::new("ClickAction"),
            error: "Element not found: #missing".to_string(),
        }
    );
}

#[tokio::test]
async fn test_true_condition_without_true_branch_runs_nothing() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = WorkflowEngine::new().add_conditional(
        ElementExists::new("#signup"),
        None,
        Some(Box::new(record(&log, "otherwise", true))),
    );

    let report = engine
        .run(&WorkflowContext::from_page(landing_page()))
        .await;

    assert!(log.lock().unwrap().is_empty());
    assert_eq!(report.outcomes(), &[StepOutcome::Skipped]);
}

#[tokio::test]
async fn test_click_missing_element_reports_failure() {
    let ctx = WorkflowContext::from_page(landing_page());
    let result = ClickAction::new("#missing").run(&ctx).await;
    assert_eq!(result, ActionResult::failure("Element not found: #missing"));
}

#[tokio::test]
async fn test_landing_flow_end_to_end() {
    let page = landing_page();
    let email = page
        .query_selector("#contact-form [name=email]")
        .unwrap()
        .unwrap();
    let api = AutomationApi::builder(WorkflowContext::from_page(page.clone())).build();

    let report = api
        .trigger_flow(
            FlowTrigger::builder(|engine| {
                engine
                    .add_action(ClickAction::new(".hero #signup"))
                    .add_if_else(
                        ElementExists::new("#contact-form"),
                        FormSubmitAction::new("#contact-form", [("email", "john@example.com")]),
                        NavigateAction::new("#pricing"),
                    )
                    .add_action(NavigateAction::new("#thanks"))
            }),
            None,
        )
        .await
        .expect("builder flow ran");

    assert_eq!(report.failure_count(), 0);
    assert_eq!(page.value(email).as_deref(), Some("john@example.com"));
    assert_eq!(page.events().len(), 1);
    assert_eq!(page.location().fragment(), Some("thanks"));
    assert_eq!(page.navigation_count(), 0);
}

#[tokio::test]
async fn test_named_trigger_without_backend_only_broadcasts() {
    let server = MockServer::start().await;
    let api = AutomationApi::builder(WorkflowContext::from_page(landing_page())).build();
    let mut events = api.subscribe();

    let params = json!({"source": "widget"}).as_object().cloned();
    assert!(api.trigger_flow("sample_flow", params.clone()).await.is_none());

    assert_eq!(
        events.try_recv().unwrap(),
        PageEvent::Flow(FlowDetail {
            name: "sample_flow".to_string(),
            params,
        })
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_is_forwarded_to_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(body_partial_json(json!({
            "event": "wallet_update",
            "metadata": {"balance": 100}
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let config = AutomationConfig::default().with_backend_events_url(
        Url::parse(&format!("{}/events", server.uri())).unwrap(),
    );
    let api = AutomationApi::builder(WorkflowContext::from_page(landing_page()))
        .config(config)
        .build();
    let mut events = api.subscribe();

    let payload = json!({"balance": 100}).as_object().cloned();
    api.webhook_event("wallet_update", payload.clone());

    assert_eq!(
        events.try_recv().unwrap(),
        PageEvent::Webhook(WebhookDetail {
            event: "wallet_update".to_string(),
            payload,
        })
    );

    for _ in 0..50 {
        if !server.received_requests().await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.verify().await;
}

#[tokio::test]
async fn test_failing_backend_is_invisible_to_caller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = AutomationConfig::default()
        .with_backend_events_url(Url::parse(&server.uri()).unwrap());
    let api = AutomationApi::builder(WorkflowContext::from_page(landing_page()))
        .config(config)
        .build();

    api.webhook_event("ping", None);
    assert!(api.trigger_flow("sample_flow", None).await.is_none());
}

#[tokio::test]
async fn test_export_round_trips_and_empty_csv() {
    let page = landing_page();
    let api = AutomationApi::builder(WorkflowContext::from_page(page.clone())).build();

    let data = json!({"orders": [{"id": "ORD-001", "amount": 1250, "shipped": true}]});
    let file = assert_ok!(api.export_data(ExportFormat::Json, &data));
    assert_eq!(file.file_name, "export.json");
    assert_eq!(serde_json::from_str::<Value>(&file.contents).unwrap(), data);

    for empty in [json!([]), Value::Null] {
        let file = assert_ok!(api.export_data(ExportFormat::Csv, &empty));
        assert_eq!(file.contents, "");
    }
    assert_eq!(page.downloads().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_invocation_counts() {
    let policy = RetryPolicy::default();

    for failures in 0..=policy.max_retries() {
        let calls = AtomicU32::new(0);
        let result = karakuri::with_retry(&policy, || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < failures {
                    Err(format!("attempt {call}"))
                } else {
                    Ok(call)
                }
            }
        })
        .await;
        assert_eq!(assert_ok!(result), failures);
        assert_eq!(calls.load(Ordering::SeqCst), failures + 1);
    }

    let calls = AtomicU32::new(0);
    let result: Result<(), String> = karakuri::with_retry(&policy, || {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        async move { Err(format!("attempt {call}")) }
    })
    .await;
    assert_eq!(assert_err!(result), "attempt 2");
    assert_eq!(calls.load(Ordering::SeqCst), policy.max_attempts());
}

#[tokio::test]
async fn test_status_poller_feeds_webhook_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "wallet_balance_eth": 1.25,
            "eks_ready": true
        })))
        .mount(&server)
        .await;

    let api = Arc::new(AutomationApi::builder(WorkflowContext::from_page(landing_page())).build());
    let mut events = api.subscribe();
    let source = HttpStatusSource::new(Url::parse(&server.uri()).unwrap()).unwrap();
    let handle = StatusPoller::new(source, Duration::from_secs(60)).start(api.clone());

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("status event in time")
        .unwrap();
    assert_eq!(
        event,
        PageEvent::Webhook(WebhookDetail {
            event: STATUS_EVENT.to_string(),
            payload: json!({"wallet_balance_eth": 1.25, "eks_ready": true})
                .as_object()
                .cloned(),
        })
    );
    handle.stop().await;
}
