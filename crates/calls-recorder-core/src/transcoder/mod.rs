mod args;
mod supervisor;
mod throttle;

pub(crate) use {args::transcoder_args, supervisor::Transcoder, throttle::LogThrottle};
