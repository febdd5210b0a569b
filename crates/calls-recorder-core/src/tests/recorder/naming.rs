use crate::{
    PluginClient,
    recorder::{fallback_filename, recording_url, resolve_filename, sanitize_filename},
    tests::fakes::{ApiBehavior, EventLog, FakePluginApi, fast_timings},
};

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{TimeZone, Utc};
use serde_json::Value;

/// WHAT: Path separators, wildcards and whitespace become underscores
/// WHY: Plugin names come from channel names typed by users
#[test]
fn given_unsafe_characters_when_sanitizing_filename_then_replaced() {
    // Given / When
    let name = sanitize_filename("Call in Town Square: 2024/01/02 *final*?\n<a|b>\"c\"\\d");

    // Then
    assert_eq!(name, "Call_in_Town_Square__2024_01_02__final____a_b__c__d");
}

/// WHAT: Fallback names combine call id and UTC time
/// WHY: Recordings must still get a unique, sortable name
#[test]
fn given_timestamp_when_building_fallback_filename_then_call_and_time_used() {
    // Given
    let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();

    // When
    let name = fallback_filename("callid", "mp4", now);

    // Then
    assert_eq!(name, "callid-2024-03-07-09_05_01.mp4");
}

/// WHAT: The plugin's name is sanitized and given the extension
/// WHY: The plugin decides how recordings are named
#[tokio::test]
async fn given_plugin_filename_when_resolving_then_sanitized_name_used() {
    // Given
    let api = FakePluginApi::start(
        ApiBehavior {
            filename: Some("Call recording".to_string()),
            ..ApiBehavior::default()
        },
        Arc::new(EventLog::default()),
    )
    .await;
    let client = PluginClient::new(api.site_url(), "token", &fast_timings()).unwrap();

    // When
    let name = resolve_filename(&client, "callid", "mp4").await;

    // Then
    assert_eq!(name, "Call_recording.mp4");
}

/// WHAT: API failures and empty names fall back to the timestamped name
/// WHY: Naming must never block a recording
#[tokio::test]
async fn given_failing_or_empty_filename_when_resolving_then_fallback_used() {
    for filename in [None, Some(String::new())] {
        // Given
        let api = FakePluginApi::start(
            ApiBehavior {
                filename,
                ..ApiBehavior::default()
            },
            Arc::new(EventLog::default()),
        )
        .await;
        let client = PluginClient::new(api.site_url(), "token", &fast_timings()).unwrap();

        // When
        let name = resolve_filename(&client, "callid", "mp4").await;

        // Then
        assert!(name.starts_with("callid-"), "{name}");
        assert!(name.ends_with(".mp4"), "{name}");
    }
}

/// WHAT: The recording page URL carries the token only in the fragment
/// WHY: Fragments are never sent to the server or its access logs
#[test]
fn given_job_when_building_recording_url_then_token_in_encoded_fragment() {
    // Given / When
    let url = recording_url("http://mm.local/", "callid", "jobid", "tok123");

    // Then: Query names the call and job
    let (base, fragment) = url.split_once('#').unwrap();
    assert_eq!(
        base,
        "http://mm.local/plugins/com.mattermost.calls/standalone/recording.html?call_id=callid&job_id=jobid"
    );
    assert!(!base.contains("tok123"));

    // Then: Fragment decodes to the token payload
    let payload: Value = serde_json::from_slice(&STANDARD.decode(fragment).unwrap()).unwrap();
    assert_eq!(payload["token"], "tok123");
}
