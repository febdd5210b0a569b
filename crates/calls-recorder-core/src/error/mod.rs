use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use thiserror::Error;

/// Recorder errors with source location tracking.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Job configuration failed validation.
    #[error("Invalid config: {reason} {location}")]
    InvalidConfig {
        /// Which rule the configuration broke.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The host is missing something the browser sandbox needs.
    #[error("Host prerequisite not met: {reason} {location}")]
    Prerequisite {
        /// Description of the missing prerequisite.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An external command could not be launched.
    #[error("Failed to spawn {command}: {source} {location}")]
    Spawn {
        /// Name of the executable.
        command: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Virtual display server failure.
    #[error("Display server error: {reason} {location}")]
    DisplayServer {
        /// Description of the failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Browser launch, protocol or evaluation failure.
    #[error("Browser error: {reason} {location}")]
    Browser {
        /// Description of the failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A polling loop in the browser driver was interrupted by the stop signal.
    #[error("Stop signal received while {phase} {location}")]
    Interrupted {
        /// Driver phase that was interrupted.
        phase: &'static str,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The browser did not report a connected call in time.
    #[error("Timed out after {timeout:?} waiting for ready signal {location}")]
    ReadyTimeout {
        /// How long we waited.
        timeout: Duration,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The transcoder could not be started.
    #[error("Transcoder error: {reason} {location}")]
    Transcoder {
        /// Description of the failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The transcoder never produced progress output.
    #[error("Timed out after {timeout:?} waiting for transcoder to start {location}")]
    TranscoderTimeout {
        /// How long we waited.
        timeout: Duration,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The browser driver did not exit in time after being told to stop.
    #[error("Timed out after {timeout:?} waiting for stopped event {location}")]
    StopTimeout {
        /// How long we waited.
        timeout: Duration,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Plugin API request could not be completed.
    #[error("{operation} failed: {source} {location}")]
    Request {
        /// The API operation being attempted.
        operation: &'static str,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Plugin API answered with a non-success status.
    #[error("{operation} failed: status {status}: {message} {location}")]
    Status {
        /// The API operation being attempted.
        operation: &'static str,
        /// HTTP status code returned.
        status: u16,
        /// Server supplied error message, or the raw body.
        message: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Plugin API payload could not be encoded or decoded.
    #[error("{operation} failed: invalid payload: {source} {location}")]
    Payload {
        /// The API operation being attempted.
        operation: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Every upload attempt failed.
    #[error("Max retry attempts reached ({attempts}), last error: {last_error} {location}")]
    MaxRetryAttempts {
        /// How many attempts were made.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Operation not allowed in the recorder's current lifecycle state.
    #[error("Invalid recorder state: {reason} {location}")]
    InvalidState {
        /// Description of the violation.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// IO error from filesystem or socket operations.
    #[error("IO error while {context}: {source} {location}")]
    Io {
        /// What we were doing.
        context: &'static str,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl RecorderError {
    /// True for errors raised because a bounded wait ran out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RecorderError::ReadyTimeout { .. }
                | RecorderError::TranscoderTimeout { .. }
                | RecorderError::StopTimeout { .. }
        )
    }

    #[track_caller]
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        RecorderError::Io {
            context,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub(crate) fn browser(reason: impl Into<String>) -> Self {
        RecorderError::Browser {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub(crate) fn request(operation: &'static str, source: reqwest::Error) -> Self {
        RecorderError::Request {
            operation,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub(crate) fn payload(operation: &'static str, source: serde_json::Error) -> Self {
        RecorderError::Payload {
            operation,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Result type alias using [`RecorderError`].
pub type Result<T> = std::result::Result<T, RecorderError>;
