use std::fmt;

/// How a recording session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything that was recorded got delivered.
    Success,
    /// Start or stop failed.
    Failed,
}

/// Lifecycle of a [`Recorder`](crate::Recorder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Constructed, not started.
    Idle,
    /// Display and browser coming up.
    Starting,
    /// Browser joined the call.
    Ready,
    /// Transcoder is producing output.
    Recording,
    /// Tearing down and delivering.
    Stopping,
    /// Terminal.
    Stopped(Outcome),
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Idle => write!(f, "idle"),
            RecorderState::Starting => write!(f, "starting"),
            RecorderState::Ready => write!(f, "ready"),
            RecorderState::Recording => write!(f, "recording"),
            RecorderState::Stopping => write!(f, "stopping"),
            RecorderState::Stopped(Outcome::Success) => write!(f, "stopped"),
            RecorderState::Stopped(Outcome::Failed) => write!(f, "failed"),
        }
    }
}
