use crate::{JobInfo, JobStatus, UploadSession};

use serde_json::json;

/// WHAT: Job status serializes with the plugin's field names
/// WHY: The plugin decodes these bodies strictly
#[test]
fn given_job_statuses_when_serializing_then_plugin_shape() {
    // Given / When
    let started = serde_json::to_value(JobStatus::started()).unwrap();
    let failed = serde_json::to_value(JobStatus::failed("no display")).unwrap();

    // Then: Error is omitted unless failing
    assert_eq!(started, json!({ "job_type": "recording", "status": "started" }));
    assert_eq!(
        failed,
        json!({ "job_type": "recording", "status": "failed", "error": "no display" })
    );
}

/// WHAT: New upload sessions omit the id
/// WHY: The server assigns ids
#[test]
fn given_new_upload_session_when_serializing_then_id_omitted() {
    // Given
    let session = UploadSession {
        channel_id: "callid".to_string(),
        filename: "call.mp4".to_string(),
        file_size: 42,
        ..UploadSession::default()
    };

    // When
    let value = serde_json::to_value(&session).unwrap();

    // Then
    assert_eq!(
        value,
        json!({ "channel_id": "callid", "filename": "call.mp4", "file_size": 42, "file_offset": 0 })
    );
}

/// WHAT: Server sessions decode despite extra fields
/// WHY: The server returns more than the recorder needs
#[test]
fn given_server_session_with_extra_fields_when_decoding_then_known_fields_read() {
    // Given
    let body = json!({
        "id": "up1",
        "type": "attachment",
        "create_at": 1700000000000u64,
        "user_id": "bot",
        "channel_id": "callid",
        "filename": "call.mp4",
        "file_size": 100,
        "file_offset": 64,
    });

    // When
    let session: UploadSession = serde_json::from_value(body).unwrap();

    // Then
    assert_eq!(session.id, "up1");
    assert_eq!(session.file_offset, 64);
    assert_eq!(session.file_size, 100);
}

/// WHAT: Job info carries the job, files and thread
/// WHY: This is how the recording gets posted to the call thread
#[test]
fn given_job_info_when_serializing_then_ids_listed() {
    // Given
    let info = JobInfo {
        job_id: "job".to_string(),
        file_ids: vec!["file1".to_string()],
        post_id: "post".to_string(),
    };

    // When / Then
    assert_eq!(
        serde_json::to_value(&info).unwrap(),
        json!({ "job_id": "job", "file_ids": ["file1"], "post_id": "post" })
    );
}
