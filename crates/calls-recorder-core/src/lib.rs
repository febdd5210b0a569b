//! Calls Recorder Core Library
//!
//! Headless call recording: joins a call in Chromium on a virtual display,
//! encodes it with ffmpeg and uploads the result to the calls plugin.
//!
//! # Example
//!
//! ```no_run
//! use calls_recorder_core::{
//!     CoreResult, Recorder, RecorderConfig, RecorderDeps, RecorderSettings,
//! };
//!
//! async fn record(mut cfg: RecorderConfig) -> CoreResult<()> {
//!     cfg.set_defaults();
//!     cfg.validate()?;
//!
//!     let settings = RecorderSettings::default();
//!     let deps = RecorderDeps::system(&cfg, &settings)?;
//!     let mut recorder = Recorder::new(cfg, settings, deps)?;
//!
//!     recorder.start().await?;
//!     tokio::signal::ctrl_c().await.ok();
//!     recorder.stop().await
//! }
//! ```

mod api;
mod browser;
mod config;
mod error;
mod process;
mod recorder;
mod signal;
mod transcoder;
mod upload;

pub use {
    api::{FileInfo, JobInfo, JobState, JobStatus, JobType, PluginClient, UploadSession},
    browser::{BrowserLauncher, BrowserPage, CdpPage, ChromiumLauncher},
    config::{AvFormat, H264Preset, RecorderConfig, RecorderSettings, RecorderTimings},
    error::{RecorderError, Result as CoreResult},
    process::{CommandRunner, DisplayServer, ProcessHandle, SignalTerminator, SystemRunner, Terminator},
    recorder::{Outcome, Recorder, RecorderDeps, RecorderState},
    upload::{Sleeper, TokioSleeper},
};
