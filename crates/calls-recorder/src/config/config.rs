//! Recorder configuration read from the process environment.
//!
//! The job launcher passes everything as environment variables. Empty
//! variables count as unset so the core defaults apply.

use crate::{AppError, AppResult};

use std::{panic::Location, path::PathBuf, str::FromStr};

use calls_recorder_core::{AvFormat, H264Preset, RecorderConfig, RecorderSettings};
use error_location::ErrorLocation;
use tracing::instrument;

/// Everything the binary needs to run one recording job.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// Per-job recording settings.
    pub recorder: RecorderConfig,
    /// Directory for recordings and the log file.
    pub data_dir: PathBuf,
    /// Local development mode.
    pub dev_mode: bool,
}

impl Config {
    /// Read the configuration from the process environment.
    #[track_caller]
    #[instrument]
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable
    /// name to its value.
    ///
    /// Numeric fields left unset stay zero; call
    /// [`RecorderConfig::set_defaults`] before validating.
    #[track_caller]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let mut recorder = RecorderConfig {
            site_url: var("SITE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            call_id: var("CALL_ID").unwrap_or_default(),
            post_id: var("POST_ID").unwrap_or_default(),
            recording_id: var("RECORDING_ID").unwrap_or_default(),
            auth_token: var("AUTH_TOKEN").unwrap_or_default(),
            ..RecorderConfig::default()
        };

        recorder.width = parse_var(var("WIDTH"), "Width")?.unwrap_or_default();
        recorder.height = parse_var(var("HEIGHT"), "Height")?.unwrap_or_default();
        recorder.video_rate = parse_var(var("VIDEO_RATE"), "VideoRate")?.unwrap_or_default();
        recorder.audio_rate = parse_var(var("AUDIO_RATE"), "AudioRate")?.unwrap_or_default();
        recorder.frame_rate = parse_var(var("FRAME_RATE"), "FrameRate")?.unwrap_or_default();

        if let Some(preset) = parse_var::<H264Preset>(var("VIDEO_PRESET"), "VideoPreset")? {
            recorder.video_preset = preset;
        }
        if let Some(format) = parse_var::<AvFormat>(var("OUTPUT_FORMAT"), "OutputFormat")? {
            recorder.output_format = format;
        }

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| RecorderSettings::default().data_dir);
        let dev_mode = var("DEV_MODE").is_some_and(|v| v == "true");

        Ok(Self {
            recorder,
            data_dir,
            dev_mode,
        })
    }

    /// Host settings for the recorder, with production timings.
    pub fn settings(&self) -> RecorderSettings {
        RecorderSettings {
            data_dir: self.data_dir.clone(),
            dev_mode: self.dev_mode,
            ..RecorderSettings::default()
        }
    }
}

#[track_caller]
fn parse_var<T>(value: Option<String>, field: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>().map_err(|e| AppError::ConfigError {
                reason: format!("failed to parse {field}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
        })
        .transpose()
}
