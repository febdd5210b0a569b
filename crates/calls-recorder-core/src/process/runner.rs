use crate::{CoreResult, RecorderError};

use std::{io, panic::Location, process::Stdio, time::Duration};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
};
use tracing::{debug, info, instrument, warn};

/// A launched external process.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Executable name, for logging.
    fn name(&self) -> &str;

    /// OS process id, if the process is still known.
    fn id(&self) -> Option<u32>;

    /// Ask the process to exit (SIGTERM).
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the process to exit (SIGKILL).
    fn kill(&mut self) -> io::Result<()>;

    /// Wait for the process to exit. `None` means it was ended by a signal.
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// Launches external commands.
pub trait CommandRunner: Send + Sync {
    /// Start `command` with the space-delimited `args`.
    ///
    /// Returns as soon as the process is running. Its stdout and stderr are
    /// copied line by line into the log until EOF.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Spawn`] if the executable cannot be found or started.
    fn run(&self, command: &str, args: &str) -> CoreResult<Box<dyn ProcessHandle>>;
}

/// [`CommandRunner`] backed by real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[track_caller]
    #[instrument(skip(self))]
    fn run(&self, command: &str, args: &str) -> CoreResult<Box<dyn ProcessHandle>> {
        info!(command, args, "Running command");

        let mut child = Command::new(command)
            .args(split_args(args))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RecorderError::Spawn {
                command: command.to_string(),
                source: e,
                location: ErrorLocation::from(Location::caller()),
            })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(log_output(command.to_string(), "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_output(command.to_string(), "stderr", stderr));
        }

        Ok(Box::new(SystemProcess {
            name: command.to_string(),
            child,
        }))
    }
}

pub(crate) fn split_args(args: &str) -> impl Iterator<Item = &str> {
    args.split(' ').filter(|a| !a.is_empty())
}

/// Copy `reader` into the log line by line until EOF.
///
/// Lines are decoded lossily. The pipe stays open until EOF; a closed pipe
/// would SIGPIPE the child.
async fn log_output<R>(command: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => return,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                debug!(command = %command, stream, "{}", line.trim_end_matches(['\r', '\n']));
            }
            Err(e) => {
                warn!(command = %command, stream, error = %e, "Error reading process output");
                return;
            }
        }
    }
}

struct SystemProcess {
    name: String,
    child: Child,
}

#[async_trait]
impl ProcessHandle for SystemProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn terminate(&mut self) -> io::Result<()> {
        let pid = self.child.id().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "process has already exited")
        })?;
        send_signal(pid, libc::SIGTERM)
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }
}

pub(crate) fn send_signal(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let pid: libc::pid_t = pid
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "PID out of range"))?;

    // SAFETY: kill(2) has no memory-safety preconditions.
    let result = unsafe { libc::kill(pid, signal) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// SIGTERM the process and wait for it, killing it if it outlives `grace`.
///
/// Failures are logged and never returned: this runs on cleanup paths.
#[instrument(skip(process), fields(command = process.name(), pid = ?process.id()))]
pub(crate) async fn shutdown_process(process: &mut dyn ProcessHandle, grace: Duration) {
    if let Err(e) = process.terminate() {
        warn!(error = %e, "Failed to send termination signal");
    }

    match tokio::time::timeout(grace, process.wait()).await {
        Ok(Ok(code)) => info!(exit_code = ?code, "Process exited"),
        Ok(Err(e)) => warn!(error = %e, "Failed waiting for process to exit"),
        Err(_) => {
            warn!(grace_ms = grace.as_millis(), "Process ignored termination, killing");
            if let Err(e) = process.kill() {
                warn!(error = %e, "Failed to kill process");
            }
            match process.wait().await {
                Ok(code) => info!(exit_code = ?code, "Process killed"),
                Err(e) => warn!(error = %e, "Failed waiting for killed process"),
            }
        }
    }
}
