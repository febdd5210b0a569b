use crate::{
    BrowserLauncher, CoreResult, RecorderError, RecorderTimings,
    browser::{
        BrowserDriver, CLIENT_INITIALIZED, DISCONNECT_SCRIPT, DriverHandle, PollError,
        poll_expression,
    },
    signal::{Signal, Trigger, one_shot},
    tests::fakes::{
        EventLog, FakeLauncher, PageHandle, PageState, RecordingTerminator, fast_timings,
    },
};

use std::{sync::Arc, time::Duration};

const URL: &str = "http://localhost/plugins/com.mattermost.calls/standalone/recording.html";
const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    page: PageHandle,
    events: Arc<EventLog>,
    terminator: Arc<RecordingTerminator>,
    stop: Trigger,
    ready: Signal,
    driver: DriverHandle,
}

fn spawn_driver(state: PageState, configure: impl FnOnce(&mut RecorderTimings)) -> Harness {
    let page = PageHandle::new(state);
    let events = Arc::new(EventLog::default());
    let terminator = Arc::new(RecordingTerminator::default());
    spawn_with(
        page.clone(),
        Arc::new(FakeLauncher::new(page, Arc::clone(&events))),
        events,
        terminator,
        configure,
    )
}

fn spawn_with(
    page: PageHandle,
    launcher: Arc<dyn BrowserLauncher>,
    events: Arc<EventLog>,
    terminator: Arc<RecordingTerminator>,
    configure: impl FnOnce(&mut RecorderTimings),
) -> Harness {
    let mut timings = fast_timings();
    configure(&mut timings);

    let (stop, stop_signal) = one_shot();
    let (ready_tx, ready) = one_shot();
    let driver = BrowserDriver::new(launcher, terminator.clone(), timings, URL.to_string())
        .spawn(stop_signal, ready_tx);

    Harness {
        page,
        events,
        terminator,
        stop,
        ready,
        driver,
    }
}

async fn finished(driver: DriverHandle) -> CoreResult<()> {
    tokio::time::timeout(WAIT, driver.done).await.unwrap().unwrap()
}

async fn wait_ready(ready: &mut Signal) -> bool {
    tokio::time::timeout(WAIT, ready.fired()).await.unwrap()
}

/// WHAT: A joining page becomes ready and disconnects on stop
/// WHY: The normal recording lifecycle
#[tokio::test]
async fn given_joining_page_when_stopped_after_ready_then_disconnects_and_closes() {
    // Given: A page that joins on the first load
    let mut h = spawn_driver(PageState::joining(), |_| {});

    // When: The call connects and the recorder stops
    assert!(wait_ready(&mut h.ready).await);
    h.stop.fire();
    let result = finished(h.driver).await;

    // Then: Clean exit, disconnect script ran, browser closed, no self termination
    assert!(result.is_ok());
    let state = h.page.state();
    assert_eq!(state.scripts, [DISCONNECT_SCRIPT]);
    assert!(state.closed);
    assert_eq!(h.terminator.calls(), 0);
    assert_eq!(h.events.snapshot(), ["browser launched", "browser closed"]);
}

/// WHAT: A remotely ended call terminates the recorder
/// WHY: Nothing is left to record once everyone leaves
#[tokio::test]
async fn given_ready_call_when_remote_side_closes_then_self_termination_requested() {
    // Given: A connected call
    let mut h = spawn_driver(PageState::joining(), |_| {});
    assert!(wait_ready(&mut h.ready).await);

    // When: The call closes remotely
    h.page.state().remotely_closed = true;
    let result = finished(h.driver).await;

    // Then: The terminator fired once and the page was not told to disconnect
    assert!(result.is_ok());
    assert_eq!(h.terminator.calls(), 1);
    let state = h.page.state();
    assert!(state.scripts.is_empty());
    assert!(state.closed);
}

/// WHAT: Failed navigations are retried until one succeeds
/// WHY: The server may not be reachable right away
#[tokio::test]
async fn given_failing_navigations_when_driving_then_retried_until_ready() {
    // Given: A page whose first two loads fail
    let mut h = spawn_driver(
        PageState {
            failing_navigations: 2,
            ..PageState::joining()
        },
        |_| {},
    );

    // When: Waiting for ready
    assert!(wait_ready(&mut h.ready).await);

    // Then: Three navigations were needed
    assert_eq!(h.page.state().navigations, 3);
    h.stop.fire();
    assert!(finished(h.driver).await.is_ok());
}

/// WHAT: Stop interrupts the navigation backoff
/// WHY: Stop must not wait out a long retry delay
#[tokio::test]
async fn given_navigation_backoff_when_stopped_then_interrupted_promptly() {
    // Given: Navigation that always fails with a long backoff
    let h = spawn_driver(
        PageState {
            failing_navigations: usize::MAX,
            ..PageState::joining()
        },
        |t| t.navigation_retry_backoff = Duration::from_secs(30),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    // When: Stopping during the backoff
    h.stop.fire();
    let result = finished(h.driver).await;

    // Then: Interrupted, and the browser still got closed
    assert!(matches!(result, Err(RecorderError::Interrupted { .. })));
    assert_eq!(h.page.state().navigations, 1);
    assert!(h.page.state().closed);
}

/// WHAT: A page that never creates its client is reset and reloaded
/// WHY: A stuck page load would otherwise block forever
#[tokio::test]
async fn given_stalled_page_when_init_times_out_then_reset_and_reloaded() {
    // Given: The client only appears on the second load
    let mut h = spawn_driver(
        PageState {
            init_on_navigation: 2,
            ..PageState::joining()
        },
        |_| {},
    );

    // When: Waiting for ready
    assert!(wait_ready(&mut h.ready).await);

    // Then: One reset and two loads
    {
        let state = h.page.state();
        assert_eq!(state.resets, 1);
        assert_eq!(state.navigations, 2);
    }
    h.stop.fire();
    assert!(finished(h.driver).await.is_ok());
}

/// WHAT: Stop while waiting for the call to connect is an interruption
/// WHY: Start reports that the browser never connected
#[tokio::test]
async fn given_unconnected_call_when_stopped_then_interrupted_without_ready() {
    // Given: A page whose client never connects
    let h = spawn_driver(
        PageState {
            connects: false,
            ..PageState::joining()
        },
        |_| {},
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    // When
    h.stop.fire();
    let result = finished(h.driver).await;

    // Then
    match result {
        Err(RecorderError::Interrupted { phase, .. }) => {
            assert_eq!(phase, "waiting for the call to connect");
        }
        other => panic!("expected Interrupted, got {other:?}"),
    }
    assert!(!h.ready.has_fired());
}

/// WHAT: Launch failure ends the driver and releases ready waiters
/// WHY: Start must not wait the full ready timeout for a dead browser
#[tokio::test]
async fn given_failing_launch_when_driving_then_error_and_ready_dropped() {
    // Given: A launcher that cannot start the browser
    let page = PageHandle::new(PageState::joining());
    let events = Arc::new(EventLog::default());
    let launcher = Arc::new(FakeLauncher::new(page.clone(), Arc::clone(&events)).failing());
    let mut h = spawn_with(
        page,
        launcher,
        events,
        Arc::new(RecordingTerminator::default()),
        |_| {},
    );

    // When
    let ready = wait_ready(&mut h.ready).await;
    let result = finished(h.driver).await;

    // Then
    assert!(!ready);
    assert!(matches!(result, Err(RecorderError::Browser { .. })));
    assert!(h.events.snapshot().is_empty());
}

/// WHAT: Polling gives up at the deadline
/// WHY: Initialization polls are bounded
#[tokio::test]
async fn given_false_expression_when_polling_with_timeout_then_timed_out() {
    // Given: A page whose client never initializes
    let page = PageHandle::new(PageState::default());
    let launcher = FakeLauncher::new(page, Arc::new(EventLog::default()));
    let mut browser = launcher.launch().await.unwrap();
    let (_stop, mut stop_signal) = one_shot();

    // When
    let result = poll_expression(
        browser.as_mut(),
        CLIENT_INITIALIZED,
        Duration::from_millis(5),
        Some(Duration::from_millis(50)),
        &mut stop_signal,
    )
    .await;

    // Then
    assert_eq!(result, Err(PollError::TimedOut));
}

/// WHAT: A fired stop wins over a pending deadline
/// WHY: Stop must be observed before any further evaluation
#[tokio::test]
async fn given_fired_stop_when_polling_then_stopped() {
    // Given: A stop signal that already fired
    let page = PageHandle::new(PageState::joining());
    let launcher = FakeLauncher::new(page.clone(), Arc::new(EventLog::default()));
    let mut browser = launcher.launch().await.unwrap();
    let (stop, mut stop_signal) = one_shot();
    stop.fire();

    // When
    let result = poll_expression(
        browser.as_mut(),
        CLIENT_INITIALIZED,
        Duration::from_millis(5),
        Some(Duration::from_secs(1)),
        &mut stop_signal,
    )
    .await;

    // Then
    assert_eq!(result, Err(PollError::Stopped));
}
