use crate::{
    BrowserPage, CdpPage, RecorderError,
    browser::CdpConnection,
    tests::fakes::{EventLog, ExitOn, FakeDevTools, FakeProcess},
};

use std::{sync::Arc, time::Duration};

use serde_json::json;

async fn open_page(devtools: &FakeDevTools, events: &Arc<EventLog>) -> CdpPage {
    let connection = CdpConnection::connect(devtools.ws_url()).await.unwrap();
    let process = FakeProcess::new("chromium", Arc::clone(events), ExitOn::Terminate);
    CdpPage::open(connection, Box::new(process), Duration::from_millis(100))
        .await
        .unwrap()
}

fn browser_reason(err: RecorderError) -> String {
    match err {
        RecorderError::Browser { reason, .. } => reason,
        other => panic!("expected Browser error, got {other}"),
    }
}

/// WHAT: Opening a page creates, attaches and enables a target
/// WHY: Flat sessions route page commands by session id
#[tokio::test]
async fn given_connection_when_opening_page_then_target_attached_and_runtime_enabled() {
    // Given: A DevTools endpoint
    let devtools = FakeDevTools::start().await;
    let events = Arc::new(EventLog::default());

    // When: Opening a page
    let _page = open_page(&devtools, &events).await;

    // Then: The target setup sequence ran
    assert_eq!(
        devtools.methods(),
        ["Target.createTarget", "Target.attachToTarget", "Runtime.enable"]
    );
}

/// WHAT: Boolean evaluation returns the page's value
/// WHY: Every driver phase polls a boolean expression
#[tokio::test]
async fn given_page_when_evaluating_booleans_then_values_returned() {
    // Given
    let devtools = FakeDevTools::start().await;
    let events = Arc::new(EventLog::default());
    let mut page = open_page(&devtools, &events).await;

    // When / Then
    assert!(page.evaluate_bool("true").await.unwrap());
    assert!(!page.evaluate_bool("false").await.unwrap());
}

/// WHAT: Non-boolean results and thrown exceptions are errors
/// WHY: A broken page must not look like "not ready yet"
#[tokio::test]
async fn given_page_when_evaluation_misbehaves_then_browser_errors() {
    // Given
    let devtools = FakeDevTools::start().await;
    let events = Arc::new(EventLog::default());
    let mut page = open_page(&devtools, &events).await;

    // When: Evaluating a number
    let number = browser_reason(page.evaluate_bool("42").await.unwrap_err());

    // When: Evaluating something that throws
    let thrown = browser_reason(page.evaluate_bool("throw").await.unwrap_err());

    // Then
    assert!(number.contains("did not yield a boolean"), "{number}");
    assert!(thrown.contains("ReferenceError: boom"), "{thrown}");
}

/// WHAT: Navigation errors reported by the browser fail navigate
/// WHY: The driver retries failed navigations
#[tokio::test]
async fn given_unreachable_url_when_navigating_then_error_text_reported() {
    // Given
    let devtools = FakeDevTools::start().await;
    let events = Arc::new(EventLog::default());
    let mut page = open_page(&devtools, &events).await;

    // When
    let ok = page.navigate("http://localhost/recording.html").await;
    let failed = page.navigate("http://unreachable.invalid/").await;

    // Then
    assert!(ok.is_ok());
    let reason = browser_reason(failed.unwrap_err());
    assert!(reason.contains("net::ERR_NAME_NOT_RESOLVED"), "{reason}");
}

/// WHAT: Reset closes the target and attaches a fresh one
/// WHY: A stalled page load is recovered by starting over
#[tokio::test]
async fn given_page_when_resetting_then_new_target_attached() {
    // Given
    let devtools = FakeDevTools::start().await;
    let events = Arc::new(EventLog::default());
    let mut page = open_page(&devtools, &events).await;

    // When
    page.reset().await.unwrap();

    // Then
    assert_eq!(
        devtools.methods()[3..],
        [
            "Target.closeTarget",
            "Target.createTarget",
            "Target.attachToTarget",
            "Runtime.enable",
        ]
    );
    assert!(page.evaluate_bool("true").await.unwrap());
}

/// WHAT: Protocol errors come back as browser errors with the message
/// WHY: Unsupported commands must not hang the caller
#[tokio::test]
async fn given_unknown_method_when_calling_then_protocol_error_returned() {
    // Given
    let devtools = FakeDevTools::start().await;
    let connection = CdpConnection::connect(devtools.ws_url()).await.unwrap();

    // When
    let result = connection.call("Nope.method", json!({}), None).await;

    // Then
    let reason = browser_reason(result.unwrap_err());
    assert!(reason.contains("wasn't found"), "{reason}");
    assert!(reason.contains("-32601"), "{reason}");
}

/// WHAT: Commands in flight fail once the socket closes
/// WHY: A crashed browser must surface as an error, not a hang
#[tokio::test]
async fn given_closed_browser_when_calling_then_connection_closed_error() {
    // Given: A browser that was told to close
    let devtools = FakeDevTools::start().await;
    let connection = CdpConnection::connect(devtools.ws_url()).await.unwrap();
    connection.call("Browser.close", json!({}), None).await.unwrap();

    // When: Issuing another command
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        connection.call("Runtime.evaluate", json!({ "expression": "true" }), None),
    )
    .await
    .unwrap();

    // Then
    assert!(matches!(result, Err(RecorderError::Browser { .. })));
}

fn assert_send_sync<T: Send + Sync>() {}

/// WHAT: A page can be driven from a spawned task
/// WHY: The browser driver runs on its own tokio task
#[tokio::test]
async fn given_open_page_when_driven_from_spawned_task_then_evaluates() {
    // Given
    assert_send_sync::<CdpPage>();
    let devtools = FakeDevTools::start().await;
    let events = Arc::new(EventLog::default());
    let mut page = open_page(&devtools, &events).await;

    // When: Navigating and evaluating on another task
    let result = tokio::spawn(async move {
        page.navigate("http://mm.local/recording").await?;
        let value = page.evaluate_bool("true").await?;
        page.run_script("42").await?;
        Ok::<_, RecorderError>(value)
    })
    .await
    .unwrap();

    // Then
    assert!(result.unwrap());
}
