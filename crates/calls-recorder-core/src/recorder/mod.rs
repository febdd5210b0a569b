mod naming;
mod orchestrator;
mod prerequisites;
mod state;

pub(crate) use {
    naming::{recording_url, resolve_filename},
    prerequisites::check_host_prerequisites,
};

#[cfg(test)]
pub(crate) use naming::{fallback_filename, sanitize_filename};

pub use {
    orchestrator::{Recorder, RecorderDeps},
    state::{Outcome, RecorderState},
};
