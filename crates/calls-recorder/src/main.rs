//! Calls Recorder: records one call and uploads it to the calls plugin.
//!
//! Configured entirely through environment variables. Exits 0 when the
//! recording was delivered or when starting failed before anything was
//! recorded, 1 when a recording may have been lost.

mod config;
mod error;
mod telemetry;

pub(crate) use error::{AppError, Result as AppResult};

use crate::config::{Config, PID_FILE};

use std::process::ExitCode;

use calls_recorder_core::{Recorder, RecorderDeps, RecorderError, RecorderSettings};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{Instrument, error, info, info_span};

/// Application entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();

    let data_dir = match &config {
        Ok(c) => c.data_dir.clone(),
        Err(_) => RecorderSettings::default().data_dir,
    };

    // Dropping the guard flushes the log file, so it lives until main returns.
    let _guard = match telemetry::init(&data_dir) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to set up logging: {e:?}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = write_pid_file() {
        error!("Failed to write pid file: {:?}", e);
        return ExitCode::FAILURE;
    }

    let mut config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            return ExitCode::FAILURE;
        }
    };
    config.recorder.set_defaults();

    let span = info_span!(
        "recorder",
        rec_id = %config.recorder.recording_id,
        job_id = %config.recorder.recording_id,
    );

    run(config).instrument(span).await
}

async fn run(config: Config) -> ExitCode {
    let mut recorder = match build_recorder(config) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to create recorder: {:?}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("starting recording");

    if let Err(e) = recorder.start().await {
        error!("Failed to start recording: {:?}", e);
        if let Err(e) = recorder.report_job_failure(&e.to_string()).await {
            error!("Failed to report job failure: {:?}", e);
        }
        if let Err(e) = recorder.stop().await {
            error!("Failed to stop recorder: {:?}", e);
        }
        // Nothing was recorded, so the job's resources can be released.
        return ExitCode::SUCCESS;
    }

    info!("recording has started");

    if let Err(e) = wait_for_shutdown().await {
        error!("Failed to wait for shutdown signal: {:?}", e);
    }

    info!("stopping recording");

    if let Err(e) = recorder.stop().await {
        error!("{}: {:?}", stop_failure_message(&e), e);
        return ExitCode::FAILURE;
    }

    info!("recording has finished, exiting");
    ExitCode::SUCCESS
}

/// Timeouts mean the recording may be incomplete and was never sent.
pub(crate) fn stop_failure_message(e: &RecorderError) -> &'static str {
    if e.is_timeout() {
        "Timed out stopping recording, local file kept undelivered"
    } else {
        "Failed to stop recording"
    }
}

fn build_recorder(config: Config) -> AppResult<Recorder> {
    config.recorder.validate()?;

    let settings = config.settings();
    let deps = RecorderDeps::system(&config.recorder, &settings)?;
    Ok(Recorder::new(config.recorder, settings, deps)?)
}

fn write_pid_file() -> AppResult<()> {
    std::fs::write(PID_FILE, std::process::id().to_string())?;
    Ok(())
}

async fn wait_for_shutdown() -> AppResult<()> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => info!("received SIGINT"),
        _ = terminate.recv() => info!("received SIGTERM"),
    }

    Ok(())
}
