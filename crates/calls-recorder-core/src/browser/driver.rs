use crate::{
    CoreResult, RecorderError, RecorderTimings,
    browser::{
        BrowserLauncher, BrowserPage, CLIENT_CONNECTED, CLIENT_DISCONNECTED, CLIENT_INITIALIZED,
        DISCONNECT_SCRIPT,
    },
    process::Terminator,
    signal::{Signal, Trigger},
};

use std::{panic::Location, sync::Arc, time::Duration};

use error_location::ErrorLocation;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{Instrument, Span, debug, error, info, instrument, warn};

/// Why a poll loop gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollError {
    TimedOut,
    Stopped,
}

/// Evaluate `expression` every `interval` until it yields `true`.
///
/// The stop signal wins over both the deadline and the next tick.
/// Evaluation failures are logged and polling continues.
pub(crate) async fn poll_expression(
    page: &mut dyn BrowserPage,
    expression: &str,
    interval: Duration,
    timeout: Option<Duration>,
    stop: &mut Signal,
) -> Result<(), PollError> {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = stop.fired() => return Err(PollError::Stopped),
            _ = &mut deadline => return Err(PollError::TimedOut),
            _ = ticker.tick() => {}
        }

        let evaluated = tokio::select! {
            biased;
            _ = stop.fired() => return Err(PollError::Stopped),
            res = page.evaluate_bool(expression) => res,
        };

        match evaluated {
            Ok(true) => {
                debug!(expression, "Expression succeeded");
                return Ok(());
            }
            Ok(false) => debug!(expression, "Expression not yet true"),
            Err(e) => warn!(expression, error = %e, "Failed to evaluate expression"),
        }
    }
}

/// Background task handle of a running driver.
pub(crate) struct DriverHandle {
    pub(crate) done: oneshot::Receiver<CoreResult<()>>,
    pub(crate) task: JoinHandle<()>,
}

/// Drives one browser page through initialize, connect and record phases.
pub(crate) struct BrowserDriver {
    launcher: Arc<dyn BrowserLauncher>,
    terminator: Arc<dyn Terminator>,
    timings: RecorderTimings,
    url: String,
}

impl BrowserDriver {
    pub(crate) fn new(
        launcher: Arc<dyn BrowserLauncher>,
        terminator: Arc<dyn Terminator>,
        timings: RecorderTimings,
        url: String,
    ) -> Self {
        Self {
            launcher,
            terminator,
            timings,
            url,
        }
    }

    /// Run the driver on a background task.
    ///
    /// `ready` fires once the call is connected. The final result is sent on
    /// the returned `done` channel exactly once, whichever way the task ends.
    pub(crate) fn spawn(self, stop: Signal, ready: Trigger) -> DriverHandle {
        let (done_tx, done) = oneshot::channel();

        let task = tokio::spawn(
            async move {
                let result = self.run(stop, ready).await;
                match &result {
                    Ok(()) => info!("Browser driver finished"),
                    Err(e) => error!(error = %e, "Browser driver failed"),
                }
                if done_tx.send(result).is_err() {
                    debug!("Nobody waiting on browser driver result");
                }
            }
            .instrument(Span::current()),
        );

        DriverHandle { done, task }
    }

    async fn run(&self, mut stop: Signal, ready: Trigger) -> CoreResult<()> {
        let launched = tokio::select! {
            biased;
            _ = stop.fired() => return Err(interrupted("launching the browser")),
            launched = self.launcher.launch() => launched,
        };
        let mut page = launched?;

        let result = self.drive(page.as_mut(), &mut stop, &ready).await;

        match tokio::time::timeout(self.timings.browser_close_timeout, page.close()).await {
            Ok(Ok(())) => info!("Browser closed"),
            Ok(Err(e)) => warn!(error = %e, "Failed to close browser"),
            Err(_) => warn!(
                timeout_ms = self.timings.browser_close_timeout.as_millis(),
                "Timed out closing browser"
            ),
        }

        result
    }

    async fn drive(
        &self,
        page: &mut dyn BrowserPage,
        stop: &mut Signal,
        ready: &Trigger,
    ) -> CoreResult<()> {
        self.initialize(page, stop).await?;

        match poll_expression(
            page,
            CLIENT_CONNECTED,
            self.timings.connect_poll_interval,
            None,
            stop,
        )
        .await
        {
            Ok(()) => {}
            Err(PollError::Stopped) => return Err(interrupted("waiting for the call to connect")),
            Err(PollError::TimedOut) => {
                return Err(RecorderError::browser("timed out waiting for the call to connect"));
            }
        }

        ready.fire();
        info!("Call connected, ready to record");

        self.watch_call(page, stop).await
    }

    /// Navigate until the page creates its call client, reloading on a stall.
    #[instrument(skip_all)]
    async fn initialize(&self, page: &mut dyn BrowserPage, stop: &mut Signal) -> CoreResult<()> {
        loop {
            let navigated = tokio::select! {
                biased;
                _ = stop.fired() => return Err(interrupted("navigating to the recording page")),
                res = page.navigate(&self.url) => res,
            };

            if let Err(e) = navigated {
                warn!(error = %e, "Failed to navigate to recording page, retrying");
                tokio::select! {
                    biased;
                    _ = stop.fired() => return Err(interrupted("navigating to the recording page")),
                    _ = tokio::time::sleep(self.timings.navigation_retry_backoff) => continue,
                }
            }

            match poll_expression(
                page,
                CLIENT_INITIALIZED,
                self.timings.init_poll_interval,
                Some(self.timings.init_poll_timeout),
                stop,
            )
            .await
            {
                Ok(()) => return Ok(()),
                Err(PollError::Stopped) => {
                    return Err(interrupted("waiting for the call client"));
                }
                Err(PollError::TimedOut) => {
                    warn!("Call client did not initialize in time, reloading page");
                    if let Err(e) = page.reset().await {
                        warn!(error = %e, "Failed to reset browsing context");
                    }
                }
            }
        }
    }

    /// Wait for the call to end remotely or for the recorder to stop us.
    #[instrument(skip_all)]
    async fn watch_call(&self, page: &mut dyn BrowserPage, stop: &mut Signal) -> CoreResult<()> {
        match poll_expression(
            page,
            CLIENT_DISCONNECTED,
            self.timings.disconnect_poll_interval,
            None,
            stop,
        )
        .await
        {
            Ok(()) => {
                info!("Call client disconnected, terminating recorder");
                self.terminator.terminate_self();
                Ok(())
            }
            Err(PollError::Stopped) => {
                info!("Stop received, disconnecting from call");
                disconnect(page).await;
                Ok(())
            }
            Err(PollError::TimedOut) => Err(RecorderError::browser(
                "timed out watching the call connection",
            )),
        }
    }
}

async fn disconnect(page: &mut dyn BrowserPage) {
    if let Err(e) = page.run_script(DISCONNECT_SCRIPT).await {
        error!(error = %e, "Failed to run disconnect script");
    }

    match page.evaluate_bool(CLIENT_DISCONNECTED).await {
        Ok(true) => info!("Disconnected from call"),
        Ok(false) => warn!("Call client still connected after disconnect"),
        Err(e) => warn!(error = %e, "Failed to check disconnect"),
    }
}

#[track_caller]
fn interrupted(phase: &'static str) -> RecorderError {
    RecorderError::Interrupted {
        phase,
        location: ErrorLocation::from(Location::caller()),
    }
}
