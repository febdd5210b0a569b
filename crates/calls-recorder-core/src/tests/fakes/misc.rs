use crate::{Sleeper, Terminator};

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

/// Counts self-termination requests instead of signalling.
#[derive(Debug, Default)]
pub(crate) struct RecordingTerminator {
    calls: AtomicUsize,
}

impl RecordingTerminator {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Terminator for RecordingTerminator {
    fn terminate_self(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records requested sleeps and returns immediately.
#[derive(Debug, Default)]
pub(crate) struct MockSleeper {
    durations: Mutex<Vec<Duration>>,
}

impl MockSleeper {
    pub(crate) fn durations(&self) -> Vec<Duration> {
        self.durations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for MockSleeper {
    async fn sleep(&self, duration: Duration) {
        self.durations.lock().unwrap().push(duration);
    }
}
