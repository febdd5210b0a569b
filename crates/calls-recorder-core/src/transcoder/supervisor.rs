use crate::{
    CoreResult, RecorderConfig, RecorderError, RecorderTimings,
    process::{CommandRunner, ProcessHandle, shutdown_process},
    signal::{Signal, Trigger, one_shot},
    transcoder::{LogThrottle, transcoder_args},
};

use std::{
    io::ErrorKind,
    panic::Location,
    path::{Path, PathBuf},
    time::Duration,
};

use error_location::ErrorLocation;
use tokio::{io::AsyncReadExt, net::UnixListener, task::JoinHandle};
use tracing::{Instrument, Span, debug, error, info, instrument, warn};

const TRANSCODER_COMMAND: &str = "ffmpeg";
const PROGRESS_BUFFER_SIZE: usize = 4096;

/// A running ffmpeg process and the listener on its progress socket.
pub struct Transcoder {
    process: Box<dyn ProcessHandle>,
    listener: JoinHandle<()>,
    stopped: Signal,
    socket_path: PathBuf,
    exit_grace: Duration,
    drain_timeout: Duration,
}

impl Transcoder {
    /// Start encoding into `out_path`.
    ///
    /// Returns once the first progress report arrives on the socket.
    ///
    /// # Errors
    ///
    /// - [`RecorderError::Io`] if the progress socket cannot be created
    /// - [`RecorderError::Transcoder`] if ffmpeg cannot be launched or exits silently
    /// - [`RecorderError::TranscoderTimeout`] if no progress arrives in time
    #[instrument(skip(runner, cfg, timings))]
    pub(crate) async fn start(
        runner: &dyn CommandRunner,
        cfg: &RecorderConfig,
        timings: &RecorderTimings,
        socket_path: &Path,
        out_path: &Path,
    ) -> CoreResult<Self> {
        remove_socket(socket_path)
            .await
            .map_err(|e| RecorderError::io("removing stale progress socket", e))?;
        let listener = UnixListener::bind(socket_path)
            .map_err(|e| RecorderError::io("binding progress socket", e))?;

        let (started_tx, mut started) = one_shot();
        let (stopped_tx, stopped) = one_shot();
        let listener = tokio::spawn(
            listen_progress(listener, started_tx, stopped_tx, timings.progress_log_interval)
                .instrument(Span::current()),
        );

        let args = transcoder_args(
            cfg,
            out_path,
            socket_path,
            timings.transcoder_progress_period,
        );
        let mut process = match runner.run(TRANSCODER_COMMAND, &args) {
            Ok(process) => process,
            Err(e) => {
                listener.abort();
                cleanup_socket(socket_path).await;
                return Err(transcoder_error(format!("failed to run transcoder: {e}")));
            }
        };

        let failure = match tokio::time::timeout(timings.transcoder_start_timeout, started.fired())
            .await
        {
            Ok(true) => None,
            Ok(false) => Some(transcoder_error(
                "transcoder exited before reporting progress",
            )),
            Err(_) => Some(RecorderError::TranscoderTimeout {
                timeout: timings.transcoder_start_timeout,
                location: ErrorLocation::from(Location::caller()),
            }),
        };

        if let Some(e) = failure {
            shutdown_process(process.as_mut(), timings.process_exit_grace).await;
            listener.abort();
            cleanup_socket(socket_path).await;
            return Err(e);
        }

        info!("Transcoder started");

        Ok(Self {
            process,
            listener,
            stopped,
            socket_path: socket_path.to_path_buf(),
            exit_grace: timings.process_exit_grace,
            drain_timeout: timings.progress_drain_timeout,
        })
    }

    /// Stop encoding.
    ///
    /// Returns after ffmpeg exited and the progress channel drained, so the
    /// output file is complete.
    #[instrument(skip(self))]
    pub(crate) async fn stop(mut self) {
        shutdown_process(self.process.as_mut(), self.exit_grace).await;

        match tokio::time::timeout(self.drain_timeout, self.stopped.fired()).await {
            Ok(_) => debug!("Progress listener finished"),
            Err(_) => warn!(
                timeout_ms = self.drain_timeout.as_millis(),
                "Progress listener did not finish after transcoder exit"
            ),
        }

        self.listener.abort();
        cleanup_socket(&self.socket_path).await;

        info!("Transcoder stopped");
    }
}

impl Drop for Transcoder {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Accept the transcoder's progress connection and watch it until EOF.
///
/// Fires `started` on the first chunk and `stopped` when the loop ends.
async fn listen_progress(
    listener: UnixListener,
    started: Trigger,
    stopped: Trigger,
    log_interval: Duration,
) {
    let mut conn = match listener.accept().await {
        Ok((conn, _)) => conn,
        Err(e) => {
            error!(error = %e, "Failed to accept progress connection");
            stopped.fire();
            return;
        }
    };
    debug!("Transcoder connected to progress socket");

    let mut throttle = LogThrottle::new(log_interval);
    let mut buf = vec![0u8; PROGRESS_BUFFER_SIZE];
    loop {
        match conn.read(&mut buf).await {
            Ok(0) => {
                debug!("Progress channel closed");
                break;
            }
            Ok(n) => {
                if started.fire() {
                    debug!("First progress report received");
                }
                if throttle.allow() {
                    let progress = String::from_utf8_lossy(&buf[..n]);
                    info!(progress = %progress.trim(), "Transcoder progress");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read progress");
                break;
            }
        }
    }

    stopped.fire();
}

async fn remove_socket(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn cleanup_socket(path: &Path) {
    if let Err(e) = remove_socket(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove progress socket");
    }
}

#[track_caller]
fn transcoder_error(reason: impl Into<String>) -> RecorderError {
    RecorderError::Transcoder {
        reason: reason.into(),
        location: ErrorLocation::from(Location::caller()),
    }
}
