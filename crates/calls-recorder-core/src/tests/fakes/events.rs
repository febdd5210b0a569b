use std::sync::Mutex;

/// Ordered record of what the fakes observed, shared across them.
#[derive(Debug, Default)]
pub(crate) struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    pub(crate) fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn contains(&self, event: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| e == event)
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    /// Index of the first event equal to `event`.
    pub(crate) fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().unwrap().iter().position(|e| e == event)
    }
}
