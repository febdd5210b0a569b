//! Log output to stdout and to a file in the data directory.

use crate::{AppError, AppResult, config::LOG_FILE_NAME};

use std::{panic::Location, path::Path};

use error_location::ErrorLocation;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "calls_recorder=debug,calls_recorder_core=debug";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must be
/// held until the process exits.
#[track_caller]
pub(crate) fn init(data_dir: &Path) -> AppResult<WorkerGuard> {
    std::fs::create_dir_all(data_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(data_dir)
        .map_err(|e| AppError::Logging {
            reason: format!("failed to open {LOG_FILE_NAME}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .map_err(|e| AppError::Logging {
            reason: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(guard)
}
