//! Polls a backend status service and prints the resulting page events.
//!
//! ```sh
//! KARAKURI_STATUS_BASE_URL=http://127.0.0.1:8001 cargo run --example status_bridge
//! ```

use karakuri::logging::{self, LogFormat};
use karakuri::prelude::*;
use karakuri::status::{HttpStatusSource, StatusPoller};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(LogFormat::Json)?;

    let config = AutomationConfig::from_env()?;
    let Some(source) = HttpStatusSource::from_config(&config)? else {
        eprintln!("Set KARAKURI_STATUS_BASE_URL to poll a status service");
        return Ok(());
    };
    let interval = config.status_interval();

    let page = Arc::new(VirtualPage::new("https://example.com/")?);
    let api = Arc::new(
        AutomationApi::builder(WorkflowContext::from_page(page))
            .config(config)
            .build(),
    );
    let mut events = api.subscribe();
    let poller = StatusPoller::new(source, interval).start(api.clone());

    let deadline = tokio::time::sleep(Duration::from_secs(60));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(event) => println!("{}", serde_json::to_string(&event)?),
                None => break,
            },
        }
    }

    poller.stop().await;
    Ok(())
}
