use serde::{Deserialize, Serialize};

/// Server side state of a resumable upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    /// Server assigned identifier. Empty when creating.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Channel the file is attached to (the call id).
    #[serde(default)]
    pub channel_id: String,
    /// Name the file will have once uploaded.
    #[serde(default)]
    pub filename: String,
    /// Total size in bytes.
    #[serde(default)]
    pub file_size: u64,
    /// Bytes the server has received so far.
    #[serde(default)]
    pub file_offset: u64,
}

/// Descriptor of an uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileInfo {
    /// Remote file identifier.
    pub id: String,
    /// Stored file name.
    #[serde(default)]
    pub name: String,
    /// Stored size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// Links uploaded files to the recording job and its call thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    /// Recording job id.
    pub job_id: String,
    /// Uploaded file ids.
    pub file_ids: Vec<String>,
    /// Thread the recording is posted to.
    pub post_id: String,
}

/// Kind of job reporting status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Call recording.
    Recording,
}

/// Reported job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Output is being produced.
    Started,
    /// The job could not run.
    Failed,
}

/// Lifecycle notification for a recording job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    /// Job kind.
    pub job_type: JobType,
    /// New state.
    pub status: JobState,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatus {
    /// Recording produces output.
    pub fn started() -> Self {
        Self {
            job_type: JobType::Recording,
            status: JobState::Started,
            error: None,
        }
    }

    /// Recording could not start.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            job_type: JobType::Recording,
            status: JobState::Failed,
            error: Some(error.into()),
        }
    }
}

/// Outcome of sending one chunk of upload data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UploadProgress {
    /// Server stored part of the body and expects a resume from its offset.
    Partial,
    /// Upload finished.
    Complete(FileInfo),
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FilenameResponse {
    #[serde(default)]
    pub(crate) filename: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub(crate) message: String,
}
