use crate::api::{PLUGIN_ID, PluginClient};

use std::sync::LazyLock;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

static FILENAME_SANITIZATION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"[\\:*?"<>|\n\s/]"#).ok());

/// Replace characters that are unsafe in file names with `_`.
pub(crate) fn sanitize_filename(name: &str) -> String {
    match FILENAME_SANITIZATION_RE.as_ref() {
        Some(re) => re.replace_all(name, "_").into_owned(),
        None => name.to_string(),
    }
}

/// `<call_id>-<UTC timestamp>.<ext>`, used when the plugin cannot name the file.
pub(crate) fn fallback_filename(call_id: &str, ext: &str, now: DateTime<Utc>) -> String {
    format!("{call_id}-{}.{ext}", now.format("%Y-%m-%d-%H_%M_%S"))
}

/// Ask the plugin for the recording's name, falling back to a timestamped one.
pub(crate) async fn resolve_filename(client: &PluginClient, call_id: &str, ext: &str) -> String {
    match client.get_filename(call_id).await {
        Ok(name) => {
            let name = sanitize_filename(&name);
            if !name.is_empty() {
                let filename = format!("{name}.{ext}");
                info!(filename = %filename, "Using plugin provided filename");
                return filename;
            }
            warn!("Plugin returned an empty filename");
        }
        Err(e) => warn!(error = %e, "Failed to get filename for call"),
    }

    let filename = fallback_filename(call_id, ext, Utc::now());
    info!(filename = %filename, "Using fallback filename");
    filename
}

/// URL of the standalone page that joins the call.
///
/// The auth token travels base64 encoded in the fragment so it never reaches
/// access logs.
pub(crate) fn recording_url(site_url: &str, call_id: &str, job_id: &str, auth_token: &str) -> String {
    let payload = json!({ "token": auth_token }).to_string();
    format!(
        "{}/plugins/{PLUGIN_ID}/standalone/recording.html?call_id={call_id}&job_id={job_id}#{}",
        site_url.trim_end_matches('/'),
        STANDARD.encode(payload)
    )
}
