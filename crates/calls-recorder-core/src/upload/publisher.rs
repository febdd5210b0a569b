use crate::{
    CoreResult, RecorderError,
    api::{JobInfo, PluginClient, UploadProgress, UploadSession},
    upload::Sleeper,
};

use std::{io::SeekFrom, panic::Location, path::Path, sync::Arc, time::Duration};

use error_location::ErrorLocation;
use tokio::{fs::File, io::AsyncSeekExt};
use tracing::{info, instrument, warn};

/// Delivers a finished recording to the plugin and links it to the job.
pub(crate) struct RecordingPublisher {
    client: Arc<PluginClient>,
    sleeper: Arc<dyn Sleeper>,
    call_id: String,
    job_id: String,
    post_id: String,
    max_attempts: u32,
    base_wait: Duration,
}

impl RecordingPublisher {
    pub(crate) fn new(
        client: Arc<PluginClient>,
        sleeper: Arc<dyn Sleeper>,
        call_id: &str,
        job_id: &str,
        post_id: &str,
        max_attempts: u32,
        base_wait: Duration,
    ) -> Self {
        Self {
            client,
            sleeper,
            call_id: call_id.to_string(),
            job_id: job_id.to_string(),
            post_id: post_id.to_string(),
            max_attempts,
            base_wait,
        }
    }

    /// Upload `path`, retrying with linear backoff.
    ///
    /// Every attempt starts a fresh upload session.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::MaxRetryAttempts`] once every attempt failed.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub(crate) async fn publish(&self, path: &Path) -> CoreResult<()> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match self.upload(path).await {
                Ok(()) => {
                    info!(attempt, "Recording uploaded successfully");
                    return Ok(());
                }
                Err(e) => e,
            };

            warn!(attempt, error = %err, "Failed to upload recording");

            if attempt >= self.max_attempts {
                return Err(RecorderError::MaxRetryAttempts {
                    attempts: attempt,
                    last_error: err.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            let wait = self.base_wait * attempt;
            info!(wait_ms = wait.as_millis(), "Retrying upload");
            self.sleeper.sleep(wait).await;
        }
    }

    /// One pass of the resumable upload protocol.
    async fn upload(&self, path: &Path) -> CoreResult<()> {
        let mut file = File::open(path)
            .await
            .map_err(|e| RecorderError::io("opening recording", e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| RecorderError::io("reading recording metadata", e))?
            .len();

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut session = self
            .client
            .create_upload(&UploadSession {
                channel_id: self.call_id.clone(),
                filename,
                file_size: size,
                ..UploadSession::default()
            })
            .await?;

        if session.file_offset > 0 {
            seek(&mut file, session.file_offset).await?;
        }

        let file_info = loop {
            match self.client.upload_data(&session.id, file.into()).await? {
                UploadProgress::Complete(info) => break info,
                UploadProgress::Partial => {
                    session = self.client.get_upload(&session.id).await?;
                    info!(
                        upload_id = %session.id,
                        offset = session.file_offset,
                        size = session.file_size,
                        "Resuming upload"
                    );

                    file = File::open(path)
                        .await
                        .map_err(|e| RecorderError::io("reopening recording", e))?;
                    seek(&mut file, session.file_offset).await?;
                }
            }
        };

        self.client
            .save_recording(
                &self.call_id,
                &JobInfo {
                    job_id: self.job_id.clone(),
                    file_ids: vec![file_info.id],
                    post_id: self.post_id.clone(),
                },
            )
            .await
    }
}

async fn seek(file: &mut File, offset: u64) -> CoreResult<()> {
    file.seek(SeekFrom::Start(offset))
        .await
        .map(|_| ())
        .map_err(|e| RecorderError::io("seeking recording to upload offset", e))
}
