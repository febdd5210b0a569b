use crate::process::runner::send_signal;

use tracing::{error, warn};

/// Ends the whole recorder process when there is nothing left to record.
pub trait Terminator: Send + Sync {
    /// Request termination of the current process.
    fn terminate_self(&self);
}

/// Sends SIGTERM to our own pid, so the regular signal path runs `stop`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalTerminator;

impl Terminator for SignalTerminator {
    fn terminate_self(&self) {
        let pid = std::process::id();
        warn!(pid, "Sending termination signal to self");
        if let Err(e) = send_signal(pid, libc::SIGTERM) {
            error!(pid, error = %e, "Failed to send termination signal to self");
        }
    }
}
