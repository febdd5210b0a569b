use crate::{
    CoreResult, RecorderError,
    config::DISPLAY_ID,
    process::{CommandRunner, ProcessHandle, runner::shutdown_process},
};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use tracing::{info, instrument};

const DISPLAY_SERVER_COMMAND: &str = "Xvfb";
const COLOR_DEPTH: u32 = 24;
const DPI: u32 = 96;

/// A running virtual framebuffer the browser renders into.
pub struct DisplayServer {
    process: Box<dyn ProcessHandle>,
}

impl DisplayServer {
    /// Start the display server on the fixed display id.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::DisplayServer`] if the process cannot be started.
    #[track_caller]
    #[instrument(skip(runner))]
    pub fn start(runner: &dyn CommandRunner, width: u32, height: u32) -> CoreResult<Self> {
        let args = display_server_args(DISPLAY_ID, width, height);
        let process = runner
            .run(DISPLAY_SERVER_COMMAND, &args)
            .map_err(|e| RecorderError::DisplayServer {
                reason: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!(display = DISPLAY_ID, width, height, "Display server started");

        Ok(Self { process })
    }

    /// Terminate the display server and wait for it to exit.
    pub async fn stop(mut self, grace: Duration) {
        shutdown_process(self.process.as_mut(), grace).await;
        info!(display = DISPLAY_ID, "Display server stopped");
    }
}

/// Screen 0 at `width`x`height`. Only the abstract local socket stays open.
pub(crate) fn display_server_args(display_id: u32, width: u32, height: u32) -> String {
    format!(
        ":{display_id} -screen 0 {width}x{height}x{COLOR_DEPTH} -dpi {DPI} -nolisten tcp -nolisten unix"
    )
}
