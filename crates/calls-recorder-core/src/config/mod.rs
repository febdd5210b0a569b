mod recorder_config;
mod settings;

pub(crate) use settings::DISPLAY_ID;

pub use {
    recorder_config::{AvFormat, H264Preset, RecorderConfig},
    settings::{RecorderSettings, RecorderTimings},
};
