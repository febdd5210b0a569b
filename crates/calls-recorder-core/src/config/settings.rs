use std::{path::PathBuf, time::Duration};

pub(crate) const DISPLAY_ID: u32 = 45;
pub(crate) const DEFAULT_DATA_DIR: &str = "/data";
pub(crate) const DEFAULT_PROGRESS_SOCKET: &str = "/tmp/recorder-progress.sock";
pub(crate) const DEFAULT_SYSCTL_PATH: &str = "/proc/sys/kernel/unprivileged_userns_clone";
pub(crate) const DEFAULT_BROWSER_BINARY: &str = "chromium";
pub(crate) const DEFAULT_DEBUGGING_PORT: u16 = 9222;

/// Every bound and cadence the recorder waits on.
///
/// Defaults are tuned for production; tests shrink them.
#[derive(Debug, Clone)]
pub struct RecorderTimings {
    /// How long `start` waits for the browser to report a connected call.
    pub ready_timeout: Duration,
    /// How long `stop` waits for the browser driver to exit.
    pub stop_timeout: Duration,
    /// How long the transcoder has to produce its first progress report.
    pub transcoder_start_timeout: Duration,
    /// Reporting period requested from the transcoder's progress channel.
    pub transcoder_progress_period: Duration,
    /// Minimum gap between two logged progress reports.
    pub progress_log_interval: Duration,
    /// How long the progress listener may take to drain after the transcoder exits.
    pub progress_drain_timeout: Duration,
    /// Grace period after SIGTERM before a child process is killed.
    pub process_exit_grace: Duration,
    /// Wait between failed navigation attempts.
    pub navigation_retry_backoff: Duration,
    /// Poll interval while waiting for the page client object.
    pub init_poll_interval: Duration,
    /// Give up on the current page load after this long without a client object.
    pub init_poll_timeout: Duration,
    /// Poll interval while waiting for the call to connect.
    pub connect_poll_interval: Duration,
    /// Poll interval while watching for a remote disconnect.
    pub disconnect_poll_interval: Duration,
    /// Bound on the graceful browser shutdown.
    pub browser_close_timeout: Duration,
    /// How long to wait for the browser's debugging endpoint to come up.
    pub browser_launch_timeout: Duration,
    /// Timeout of ordinary plugin API requests.
    pub http_request_timeout: Duration,
    /// Timeout of a single upload data request.
    pub http_upload_timeout: Duration,
    /// Total number of upload attempts before giving up.
    pub upload_max_attempts: u32,
    /// Linear backoff unit between upload attempts.
    pub upload_retry_base_wait: Duration,
}

impl Default for RecorderTimings {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(15),
            stop_timeout: Duration::from_secs(10),
            transcoder_start_timeout: Duration::from_secs(10),
            transcoder_progress_period: Duration::from_secs(1),
            progress_log_interval: Duration::from_secs(10),
            progress_drain_timeout: Duration::from_secs(5),
            process_exit_grace: Duration::from_secs(30),
            navigation_retry_backoff: Duration::from_secs(1),
            init_poll_interval: Duration::from_millis(200),
            init_poll_timeout: Duration::from_secs(5),
            connect_poll_interval: Duration::from_millis(200),
            disconnect_poll_interval: Duration::from_secs(1),
            browser_close_timeout: Duration::from_secs(10),
            browser_launch_timeout: Duration::from_secs(10),
            http_request_timeout: Duration::from_secs(10),
            http_upload_timeout: Duration::from_secs(5 * 60),
            upload_max_attempts: 20,
            upload_retry_base_wait: Duration::from_secs(5),
        }
    }
}

/// Host environment the recorder runs in.
///
/// Everything the recorder would otherwise read from process globals.
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    /// Directory recordings are written to.
    pub data_dir: PathBuf,
    /// Relaxes browser sandboxing and trusts local development origins.
    pub dev_mode: bool,
    /// Unix socket the transcoder reports progress on.
    pub progress_socket: PathBuf,
    /// Sysctl file checked before launching the browser.
    pub sysctl_path: PathBuf,
    /// Browser executable name.
    pub browser_binary: String,
    /// Remote debugging port the browser listens on.
    pub debugging_port: u16,
    /// Timeouts and intervals.
    pub timings: RecorderTimings,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            dev_mode: false,
            progress_socket: PathBuf::from(DEFAULT_PROGRESS_SOCKET),
            sysctl_path: PathBuf::from(DEFAULT_SYSCTL_PATH),
            browser_binary: DEFAULT_BROWSER_BINARY.to_string(),
            debugging_port: DEFAULT_DEBUGGING_PORT,
            timings: RecorderTimings::default(),
        }
    }
}
