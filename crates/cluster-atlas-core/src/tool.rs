//! Blocking invocation of external command-line tools with a deadline

use crate::error::{ClusterError, Result};
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval between child status polls
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Default deadline for one tool invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Captured result of a finished tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Best human-readable failure detail: stderr, falling back to stdout
    #[must_use]
    pub fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// An external program plus the arguments that precede every call
/// (e.g. `atlasq ohi`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Run the tool to completion, killing it once `timeout` has elapsed
    ///
    /// # Errors
    ///
    /// - `ClusterError::ToolNotFound` if the program cannot be started
    /// - `ClusterError::ExternalToolTimeout` if the deadline passes
    /// - `ClusterError::ExternalToolFailure` on nonzero exit
    pub fn run<I, S>(&self, args: I, timeout: Duration) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        // Anonymous files instead of pipes: a chatty child can never block on
        // a full pipe while we poll it
        let mut stdout_file = tempfile::tempfile()?;
        let mut stderr_file = tempfile::tempfile()?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.try_clone()?))
            .stderr(Stdio::from(stderr_file.try_clone()?));

        debug!("Running command: {:?}", command);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ClusterError::ToolNotFound(self.program.clone())
            } else {
                ClusterError::Io(e)
            }
        })?;

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() > timeout {
                warn!(
                    "{} did not finish within {:?}, killing it",
                    self.program, timeout
                );
                let _ = child.kill();
                let _ = child.wait(); // Reap zombie
                return Err(ClusterError::ExternalToolTimeout {
                    tool: self.program.clone(),
                    seconds: timeout.as_secs(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let output = ToolOutput {
            status,
            stdout: read_captured(&mut stdout_file)?,
            stderr: read_captured(&mut stderr_file)?,
        };

        if !status.success() {
            return Err(ClusterError::ExternalToolFailure {
                tool: self.program.clone(),
                status: status.code(),
                detail: output.detail(),
            });
        }

        Ok(output)
    }
}

fn read_captured(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
