//! One-shot signals shared between the recorder and its background tasks.
//!
//! A [`Trigger`] fires at most once; any number of [`Signal`] clones may wait
//! on it, before or after it fired. Firing twice is a no-op.

use tokio::sync::watch;

/// Create a connected trigger and signal.
pub(crate) fn one_shot() -> (Trigger, Signal) {
    let (tx, rx) = watch::channel(false);
    (Trigger(tx), Signal(rx))
}

/// The firing side of a one-shot signal.
#[derive(Debug)]
pub(crate) struct Trigger(watch::Sender<bool>);

impl Trigger {
    /// Fire the signal. Returns `false` if it had already fired.
    pub(crate) fn fire(&self) -> bool {
        !self.0.send_replace(true)
    }

    /// Another waiting side for this trigger.
    pub(crate) fn subscribe(&self) -> Signal {
        Signal(self.0.subscribe())
    }
}

/// The waiting side of a one-shot signal.
#[derive(Debug, Clone)]
pub(crate) struct Signal(watch::Receiver<bool>);

impl Signal {
    /// Wait until the signal fires.
    ///
    /// Returns `false` if the trigger was dropped without firing.
    pub(crate) async fn fired(&mut self) -> bool {
        self.0.wait_for(|fired| *fired).await.is_ok()
    }

    /// Whether the signal has fired already.
    #[cfg(test)]
    pub(crate) fn has_fired(&self) -> bool {
        *self.0.borrow()
    }
}
