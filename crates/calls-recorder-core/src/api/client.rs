use crate::{
    CoreResult, RecorderError, RecorderTimings,
    api::types::{
        ApiErrorBody, FileInfo, FilenameResponse, JobInfo, JobStatus, UploadProgress,
        UploadSession,
    },
};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use reqwest::{RequestBuilder, Response, StatusCode, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};

pub(crate) const PLUGIN_ID: &str = "com.mattermost.calls";

/// Authenticated client for the calls plugin bot API.
#[derive(Clone)]
pub struct PluginClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
    upload_timeout: Duration,
}

impl std::fmt::Debug for PluginClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginClient")
            .field("base_url", &self.base_url)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

impl PluginClient {
    /// Client for the plugin hosted at `site_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Request`] if the HTTP client cannot be built.
    pub fn new(site_url: &str, auth_token: &str, timings: &RecorderTimings) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timings.http_request_timeout)
            .build()
            .map_err(|e| RecorderError::request("build HTTP client", e))?;

        Ok(Self {
            http,
            base_url: format!("{}/plugins/{PLUGIN_ID}/bot", site_url.trim_end_matches('/')),
            auth_token: auth_token.to_string(),
            upload_timeout: timings.http_upload_timeout,
        })
    }

    /// Base URL every endpoint hangs off.
    #[cfg(test)]
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Name the plugin wants the call's recording to have, unsanitized.
    #[instrument(skip(self))]
    pub async fn get_filename(&self, call_id: &str) -> CoreResult<String> {
        let url = format!("{}/calls/{call_id}/filename", self.base_url);
        let resp = self.send("get filename", self.http.get(url)).await?;
        let body: FilenameResponse = decode("get filename", resp).await?;
        Ok(body.filename)
    }

    /// Create an upload session.
    #[instrument(skip(self, session), fields(filename = %session.filename, size = session.file_size))]
    pub async fn create_upload(&self, session: &UploadSession) -> CoreResult<UploadSession> {
        let url = format!("{}/uploads", self.base_url);
        let resp = self
            .send("create upload", self.http.post(url).json(session))
            .await?;
        decode("create upload", resp).await
    }

    /// Fetch an upload session, including the offset to resume from.
    #[instrument(skip(self))]
    pub async fn get_upload(&self, upload_id: &str) -> CoreResult<UploadSession> {
        let url = format!("{}/uploads/{upload_id}", self.base_url);
        let resp = self.send("get upload", self.http.get(url)).await?;
        decode("get upload", resp).await
    }

    /// Send file bytes to an upload session.
    #[instrument(skip(self, body))]
    pub(crate) async fn upload_data(
        &self,
        upload_id: &str,
        body: reqwest::Body,
    ) -> CoreResult<UploadProgress> {
        let url = format!("{}/uploads/{upload_id}", self.base_url);
        let request = self.http.post(url).timeout(self.upload_timeout).body(body);
        let resp = self.send("upload data", request).await?;

        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(UploadProgress::Partial);
        }
        let info: FileInfo = decode("upload data", resp).await?;
        Ok(UploadProgress::Complete(info))
    }

    /// Attach uploaded files to the recording job.
    #[instrument(skip(self, info), fields(job_id = %info.job_id))]
    pub async fn save_recording(&self, call_id: &str, info: &JobInfo) -> CoreResult<()> {
        let url = format!("{}/calls/{call_id}/recordings", self.base_url);
        self.send("save recording", self.http.post(url).json(info))
            .await
            .map(|_| ())
    }

    /// Report a job lifecycle change.
    #[instrument(skip(self, status), fields(status = ?status.status))]
    pub async fn post_job_status(
        &self,
        call_id: &str,
        job_id: &str,
        status: &JobStatus,
    ) -> CoreResult<()> {
        let url = format!("{}/calls/{call_id}/jobs/{job_id}/status", self.base_url);
        self.send("post job status", self.http.post(url).json(status))
            .await
            .map(|_| ())
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> CoreResult<Response> {
        let resp = request
            .header(AUTHORIZATION, format!("Bearer {}", self.auth_token))
            .send()
            .await
            .map_err(|e| {
                error!(operation, error = %e, "Request failed");
                RecorderError::request(operation, e)
            })?;

        let status = resp.status();
        if status.is_success() {
            debug!(operation, status = status.as_u16(), "Request succeeded");
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        error!(operation, status = status.as_u16(), body = %body, "Request failed with status");
        Err(status_error(operation, status, &body))
    }
}

async fn decode<T: DeserializeOwned>(operation: &'static str, resp: Response) -> CoreResult<T> {
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| RecorderError::request(operation, e))?;
    serde_json::from_slice(&bytes).map_err(|e| RecorderError::payload(operation, e))
}

/// Error for a non-success response, preferring the server's `message` field.
#[track_caller]
pub(crate) fn status_error(operation: &'static str, status: StatusCode, body: &str) -> RecorderError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) if !parsed.message.is_empty() => parsed.message,
        _ => body.trim().to_string(),
    };

    RecorderError::Status {
        operation,
        status: status.as_u16(),
        message,
        location: ErrorLocation::from(Location::caller()),
    }
}
