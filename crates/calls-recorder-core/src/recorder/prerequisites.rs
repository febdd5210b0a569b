use crate::{CoreResult, RecorderError};

use std::{panic::Location, path::Path};

use error_location::ErrorLocation;
use tracing::{debug, warn};

/// Verify the kernel lets the browser sandbox create user namespaces.
///
/// An unreadable sysctl, or a platform other than Linux, only warns.
///
/// # Errors
///
/// Returns [`RecorderError::Prerequisite`] if the sysctl is readable and disabled.
#[track_caller]
pub(crate) fn check_host_prerequisites(sysctl_path: &Path) -> CoreResult<()> {
    if !cfg!(target_os = "linux") {
        warn!(os = std::env::consts::OS, "Skipping host prerequisite check on unsupported platform");
        return Ok(());
    }

    match std::fs::read_to_string(sysctl_path) {
        Err(e) => {
            warn!(path = %sysctl_path.display(), error = %e, "Failed to read sysctl");
            Ok(())
        }
        Ok(value) if value.trim() == "1" => {
            debug!("kernel.unprivileged_userns_clone is correctly set");
            Ok(())
        }
        Ok(_) => Err(RecorderError::Prerequisite {
            reason: "kernel.unprivileged_userns_clone should be enabled for the recording process to work"
                .to_string(),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}
