use crate::{CoreResult, RecorderError};

use std::{fmt, panic::Location, str::FromStr, sync::LazyLock};

use error_location::ErrorLocation;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

pub(crate) const VIDEO_WIDTH_DEFAULT: u32 = 1920;
pub(crate) const VIDEO_HEIGHT_DEFAULT: u32 = 1080;
pub(crate) const VIDEO_RATE_DEFAULT: u32 = 1500;
pub(crate) const AUDIO_RATE_DEFAULT: u32 = 64;
pub(crate) const FRAME_RATE_DEFAULT: u32 = 30;

const VIDEO_WIDTH_RANGE: (u32, u32) = (1280, 3840);
const VIDEO_HEIGHT_RANGE: (u32, u32) = (720, 2160);
const VIDEO_RATE_RANGE: (u32, u32) = (500, 10000);
const AUDIO_RATE_RANGE: (u32, u32) = (32, 320);
const FRAME_RATE_RANGE: (u32, u32) = (10, 60);

static ID_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new("^[a-z0-9]{26}$").ok());

/// Output container format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvFormat {
    /// MPEG-4 Part 14.
    #[default]
    Mp4,
}

impl AvFormat {
    /// File extension used for recordings in this format.
    pub fn extension(self) -> &'static str {
        match self {
            AvFormat::Mp4 => "mp4",
        }
    }
}

impl fmt::Display for AvFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AvFormat {
    type Err = RecorderError;

    #[track_caller]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp4" => Ok(AvFormat::Mp4),
            other => Err(RecorderError::InvalidConfig {
                reason: format!("OutputFormat {other:?} is not valid"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

/// x264 speed/quality preset passed to the transcoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum H264Preset {
    /// `medium`
    Medium,
    /// `fast`
    #[default]
    Fast,
    /// `faster`
    Faster,
    /// `veryfast`
    VeryFast,
    /// `superfast`
    SuperFast,
    /// `ultrafast`
    UltraFast,
}

impl H264Preset {
    /// Name as understood by the encoder.
    pub fn as_str(self) -> &'static str {
        match self {
            H264Preset::Medium => "medium",
            H264Preset::Fast => "fast",
            H264Preset::Faster => "faster",
            H264Preset::VeryFast => "veryfast",
            H264Preset::SuperFast => "superfast",
            H264Preset::UltraFast => "ultrafast",
        }
    }
}

impl fmt::Display for H264Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for H264Preset {
    type Err = RecorderError;

    #[track_caller]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medium" => Ok(H264Preset::Medium),
            "fast" => Ok(H264Preset::Fast),
            "faster" => Ok(H264Preset::Faster),
            "veryfast" => Ok(H264Preset::VeryFast),
            "superfast" => Ok(H264Preset::SuperFast),
            "ultrafast" => Ok(H264Preset::UltraFast),
            other => Err(RecorderError::InvalidConfig {
                reason: format!("VideoPreset {other:?} is not valid"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

/// Per-job recording configuration.
///
/// Zero numeric fields mean "unset"; call [`RecorderConfig::set_defaults`]
/// and then [`RecorderConfig::validate`] before handing it to a
/// [`Recorder`](crate::Recorder). The recorder itself never re-validates.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Base URL of the server hosting the call, without a trailing slash.
    pub site_url: String,
    /// Identifier of the call to record.
    pub call_id: String,
    /// Identifier of the post (thread) the recording is attached to.
    pub post_id: String,
    /// Identifier of the recording job.
    pub recording_id: String,
    /// Bot authentication token.
    pub auth_token: String,

    /// Capture width in pixels.
    pub width: u32,
    /// Capture height in pixels.
    pub height: u32,
    /// Video bitrate in kbps.
    pub video_rate: u32,
    /// Audio bitrate in kbps.
    pub audio_rate: u32,
    /// Capture frame rate.
    pub frame_rate: u32,
    /// Encoder preset.
    pub video_preset: H264Preset,
    /// Output container.
    pub output_format: AvFormat,
}

// Hand-written so the auth token never lands in logs.
impl fmt::Debug for RecorderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderConfig")
            .field("site_url", &self.site_url)
            .field("call_id", &self.call_id)
            .field("post_id", &self.post_id)
            .field("recording_id", &self.recording_id)
            .field("auth_token", &"<redacted>")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("video_rate", &self.video_rate)
            .field("audio_rate", &self.audio_rate)
            .field("frame_rate", &self.frame_rate)
            .field("video_preset", &self.video_preset)
            .field("output_format", &self.output_format)
            .finish()
    }
}

impl RecorderConfig {
    /// Fill every unset output setting with its default.
    pub fn set_defaults(&mut self) {
        if self.width == 0 {
            self.width = VIDEO_WIDTH_DEFAULT;
        }
        if self.height == 0 {
            self.height = VIDEO_HEIGHT_DEFAULT;
        }
        if self.video_rate == 0 {
            self.video_rate = VIDEO_RATE_DEFAULT;
        }
        if self.audio_rate == 0 {
            self.audio_rate = AUDIO_RATE_DEFAULT;
        }
        if self.frame_rate == 0 {
            self.frame_rate = FRAME_RATE_DEFAULT;
        }
    }

    /// Check every field against its accepted format or range.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::InvalidConfig`] naming the first offending field.
    #[track_caller]
    pub fn validate(&self) -> CoreResult<()> {
        if *self == RecorderConfig::default() {
            return Err(invalid("config cannot be empty"));
        }

        if self.site_url.is_empty() {
            return Err(invalid("SiteURL cannot be empty"));
        }
        let site = Url::parse(&self.site_url)
            .map_err(|e| invalid(format!("SiteURL parsing failed: {e}")))?;
        if site.scheme() != "http" && site.scheme() != "https" {
            return Err(invalid(format!(
                "SiteURL parsing failed: invalid scheme {:?}",
                site.scheme()
            )));
        }
        if site.path() != "/" && !site.path().is_empty() {
            return Err(invalid(format!(
                "SiteURL parsing failed: invalid path {:?}",
                site.path()
            )));
        }

        check_id("CallID", &self.call_id)?;
        check_id("PostID", &self.post_id)?;
        check_id("RecordingID", &self.recording_id)?;
        check_id("AuthToken", &self.auth_token)?;

        check_range("Width", self.width, VIDEO_WIDTH_RANGE)?;
        check_range("Height", self.height, VIDEO_HEIGHT_RANGE)?;
        check_range("VideoRate", self.video_rate, VIDEO_RATE_RANGE)?;
        check_range("AudioRate", self.audio_rate, AUDIO_RATE_RANGE)?;
        check_range("FrameRate", self.frame_rate, FRAME_RATE_RANGE)?;

        Ok(())
    }
}

#[track_caller]
fn invalid(reason: impl Into<String>) -> RecorderError {
    RecorderError::InvalidConfig {
        reason: reason.into(),
        location: ErrorLocation::from(Location::caller()),
    }
}

#[track_caller]
fn check_id(name: &str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        return Err(invalid(format!("{name} cannot be empty")));
    }
    match ID_RE.as_ref() {
        Some(re) if re.is_match(value) => Ok(()),
        _ => Err(invalid(format!("{name} parsing failed"))),
    }
}

#[track_caller]
fn check_range(name: &str, value: u32, (min, max): (u32, u32)) -> CoreResult<()> {
    if value < min || value > max {
        return Err(invalid(format!(
            "{name} value is not valid: {value} not in {min}..={max}"
        )));
    }
    Ok(())
}
