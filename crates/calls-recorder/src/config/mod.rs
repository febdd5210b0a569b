#[allow(clippy::module_inception)]
mod config;

pub(crate) use config::Config;

pub(crate) const PID_FILE: &str = "/tmp/recorder.pid";
pub(crate) const LOG_FILE_NAME: &str = "recorder.log";
