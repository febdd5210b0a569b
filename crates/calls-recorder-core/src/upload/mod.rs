mod publisher;
mod sleeper;

pub(crate) use publisher::RecordingPublisher;

pub use sleeper::{Sleeper, TokioSleeper};
