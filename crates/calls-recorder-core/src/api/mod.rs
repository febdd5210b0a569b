mod client;
mod types;

pub(crate) use {client::PLUGIN_ID, types::UploadProgress};

#[cfg(test)]
pub(crate) use client::status_error;

pub use {
    client::PluginClient,
    types::{FileInfo, JobInfo, JobState, JobStatus, JobType, UploadSession},
};
