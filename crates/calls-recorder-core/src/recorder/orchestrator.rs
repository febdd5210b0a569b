use crate::{
    CoreResult, RecorderConfig, RecorderError, RecorderSettings,
    api::{JobStatus, PluginClient},
    browser::{BrowserDriver, BrowserLauncher, ChromiumLauncher, DriverHandle},
    process::{CommandRunner, DisplayServer, SignalTerminator, SystemRunner, Terminator},
    recorder::{
        Outcome, RecorderState, check_host_prerequisites, recording_url, resolve_filename,
    },
    signal::{Trigger, one_shot},
    transcoder::Transcoder,
    upload::{RecordingPublisher, Sleeper, TokioSleeper},
};

use std::{
    io::ErrorKind,
    panic::Location,
    path::{Path, PathBuf},
    sync::Arc,
};

use error_location::ErrorLocation;
use tracing::{debug, error, info, instrument, warn};

/// Capabilities the recorder drives: processes, the browser, self-termination
/// and backoff sleeps.
#[derive(Clone)]
pub struct RecorderDeps {
    /// Launches external commands.
    pub runner: Arc<dyn CommandRunner>,
    /// Starts the browser page that joins the call.
    pub launcher: Arc<dyn BrowserLauncher>,
    /// Ends the process when the call ends remotely.
    pub terminator: Arc<dyn Terminator>,
    /// Waits between upload attempts.
    pub sleeper: Arc<dyn Sleeper>,
}

impl RecorderDeps {
    /// Production capabilities: real processes, Chromium, SIGTERM, tokio timers.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser launcher cannot be configured.
    pub fn system(cfg: &RecorderConfig, settings: &RecorderSettings) -> CoreResult<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let launcher = ChromiumLauncher::new(Arc::clone(&runner), cfg, settings)?;
        Ok(Self {
            runner,
            launcher: Arc::new(launcher),
            terminator: Arc::new(SignalTerminator),
            sleeper: Arc::new(TokioSleeper),
        })
    }
}

/// One recording session: joins the call, records it, delivers the file.
///
/// Not reusable: after [`stop`](Recorder::stop) the recorder is done.
pub struct Recorder {
    cfg: RecorderConfig,
    settings: RecorderSettings,
    deps: RecorderDeps,
    client: Arc<PluginClient>,
    state: RecorderState,
    released: bool,
    stop: Trigger,
    display: Option<DisplayServer>,
    driver: Option<DriverHandle>,
    transcoder: Option<Transcoder>,
    out_path: Option<PathBuf>,
}

impl Recorder {
    /// Create a recorder for an already defaulted and validated config.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Request`] if the plugin API client cannot be built.
    pub fn new(
        cfg: RecorderConfig,
        settings: RecorderSettings,
        deps: RecorderDeps,
    ) -> CoreResult<Self> {
        let client = PluginClient::new(&cfg.site_url, &cfg.auth_token, &settings.timings)?;
        let (stop, _) = one_shot();

        Ok(Self {
            cfg,
            settings,
            deps,
            client: Arc::new(client),
            state: RecorderState::Idle,
            released: false,
            stop,
            display: None,
            driver: None,
            transcoder: None,
            out_path: None,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Where the recording is written, once known.
    pub fn out_path(&self) -> Option<&Path> {
        self.out_path.as_deref()
    }

    /// Join the call and begin recording.
    ///
    /// On error the recorder is left in `Stopped(Failed)`; [`stop`](Recorder::stop)
    /// must still be called to release what was started.
    ///
    /// # Errors
    ///
    /// - [`RecorderError::InvalidState`] if called more than once
    /// - [`RecorderError::Prerequisite`] or [`RecorderError::DisplayServer`] on setup failure
    /// - [`RecorderError::ReadyTimeout`] if the browser does not connect in time
    /// - transcoder and job status errors
    #[instrument(skip(self), fields(call_id = %self.cfg.call_id))]
    pub async fn start(&mut self) -> CoreResult<()> {
        if self.state != RecorderState::Idle {
            return Err(invalid_state(format!("cannot start while {}", self.state)));
        }

        self.state = RecorderState::Starting;
        match self.start_session().await {
            Ok(()) => {
                info!("Recording started");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, state = %self.state, "Failed to start recording");
                self.state = RecorderState::Stopped(Outcome::Failed);
                Err(e)
            }
        }
    }

    async fn start_session(&mut self) -> CoreResult<()> {
        let timings = &self.settings.timings;

        check_host_prerequisites(&self.settings.sysctl_path)?;

        self.display = Some(DisplayServer::start(
            self.deps.runner.as_ref(),
            self.cfg.width,
            self.cfg.height,
        )?);

        let filename = resolve_filename(
            &self.client,
            &self.cfg.call_id,
            self.cfg.output_format.extension(),
        )
        .await;
        let out_path = self.settings.data_dir.join(filename);
        self.out_path = Some(out_path.clone());

        let url = recording_url(
            &self.cfg.site_url,
            &self.cfg.call_id,
            &self.cfg.recording_id,
            &self.cfg.auth_token,
        );

        let (ready_tx, mut ready) = one_shot();
        let driver = BrowserDriver::new(
            Arc::clone(&self.deps.launcher),
            Arc::clone(&self.deps.terminator),
            timings.clone(),
            url,
        );
        self.driver = Some(driver.spawn(self.stop.subscribe(), ready_tx));

        match tokio::time::timeout(timings.ready_timeout, ready.fired()).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(RecorderError::browser(
                    "browser driver exited before the call connected",
                ));
            }
            Err(_) => {
                return Err(RecorderError::ReadyTimeout {
                    timeout: timings.ready_timeout,
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }

        self.state = RecorderState::Ready;
        info!("Browser connected, ready to record");

        self.transcoder = Some(
            Transcoder::start(
                self.deps.runner.as_ref(),
                &self.cfg,
                timings,
                &self.settings.progress_socket,
                &out_path,
            )
            .await?,
        );
        self.state = RecorderState::Recording;

        self.report_job_started().await
    }

    /// Stop recording, tear everything down and deliver the file.
    ///
    /// Safe after a failed [`start`](Recorder::start). A second call is a no-op.
    /// Cleanup always runs; the local file is kept when delivery fails.
    ///
    /// # Errors
    ///
    /// - [`RecorderError::StopTimeout`] if the browser driver does not exit in time
    /// - [`RecorderError::MaxRetryAttempts`] if the upload never succeeds
    /// - [`RecorderError::InvalidState`] if the recorder was never started
    #[instrument(skip(self), fields(call_id = %self.cfg.call_id))]
    pub async fn stop(&mut self) -> CoreResult<()> {
        if self.released {
            warn!(state = %self.state, "Recorder already stopped");
            return Ok(());
        }
        if self.state == RecorderState::Idle {
            return Err(invalid_state("cannot stop a recorder that was never started"));
        }
        self.released = true;

        let was_recording = self.state == RecorderState::Recording;
        if was_recording {
            self.state = RecorderState::Stopping;
        }

        if let Some(transcoder) = self.transcoder.take() {
            transcoder.stop().await;
        }

        self.stop.fire();

        let driver_result = match self.driver.take() {
            Some(driver) => self.wait_driver(driver).await,
            None => Ok(()),
        };

        if let Some(display) = self.display.take() {
            display.stop(self.settings.timings.process_exit_grace).await;
        }

        if let Err(e) = driver_result {
            self.state = RecorderState::Stopped(Outcome::Failed);
            return Err(e);
        }

        let Some(out_path) = self.out_path.clone() else {
            return Ok(());
        };

        if was_recording {
            let publisher = RecordingPublisher::new(
                Arc::clone(&self.client),
                Arc::clone(&self.deps.sleeper),
                &self.cfg.call_id,
                &self.cfg.recording_id,
                &self.cfg.post_id,
                self.settings.timings.upload_max_attempts,
                self.settings.timings.upload_retry_base_wait,
            );
            if let Err(e) = publisher.publish(&out_path).await {
                error!(error = %e, path = %out_path.display(), "Failed to publish recording, keeping local file");
                self.state = RecorderState::Stopped(Outcome::Failed);
                return Err(e);
            }
            self.state = RecorderState::Stopped(Outcome::Success);
        }

        remove_recording(&out_path).await;

        info!(state = %self.state, "Recorder stopped");
        Ok(())
    }

    /// Tell the plugin the recording is producing output.
    ///
    /// # Errors
    ///
    /// Returns the API error if the status could not be delivered.
    #[instrument(skip(self))]
    pub async fn report_job_started(&self) -> CoreResult<()> {
        self.client
            .post_job_status(
                &self.cfg.call_id,
                &self.cfg.recording_id,
                &JobStatus::started(),
            )
            .await
    }

    /// Tell the plugin the job could not run.
    ///
    /// # Errors
    ///
    /// Returns the API error if the status could not be delivered.
    #[instrument(skip(self, message))]
    pub async fn report_job_failure(&self, message: &str) -> CoreResult<()> {
        self.client
            .post_job_status(
                &self.cfg.call_id,
                &self.cfg.recording_id,
                &JobStatus::failed(message),
            )
            .await
    }

    async fn wait_driver(&self, driver: DriverHandle) -> CoreResult<()> {
        let timeout = self.settings.timings.stop_timeout;
        match tokio::time::timeout(timeout, driver.done).await {
            Ok(Ok(Ok(()))) => debug!("Browser driver exited"),
            Ok(Ok(Err(e))) => warn!(error = %e, "Browser driver exited with error"),
            Ok(Err(_)) => warn!("Browser driver ended without reporting"),
            Err(_) => {
                driver.task.abort();
                return Err(RecorderError::StopTimeout {
                    timeout,
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
        Ok(())
    }
}

async fn remove_recording(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed local recording"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove recording"),
    }
}

#[track_caller]
fn invalid_state(reason: impl Into<String>) -> RecorderError {
    RecorderError::InvalidState {
        reason: reason.into(),
        location: ErrorLocation::from(Location::caller()),
    }
}
