//! Async executor for styxy CLI commands
//!
//! Every invocation is a scoped child process: stdout and stderr are
//! captured, the call is bounded by a timeout, and the child is killed if
//! the future is dropped before it exits.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use super::error::{CliError, CliResult};

/// Default bound on a single CLI invocation
pub const DEFAULT_CLI_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to the external `styxy` command
#[derive(Debug, Clone)]
pub struct StyxyCli {
    program: PathBuf,
    base_args: Vec<String>,
    timeout: Duration,
}

impl StyxyCli {
    /// Invoke `program` directly, e.g. `styxy` from PATH
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            timeout: DEFAULT_CLI_TIMEOUT,
        }
    }

    /// Arguments placed before every command, for launchers like `npx styxy`
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Execute a styxy command and return stdout as text
    #[instrument(skip(self), fields(cmd = %args.join(" ")))]
    pub async fn run(&self, args: &[&str]) -> CliResult<String> {
        let stdout = self.execute(args).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    /// Execute a styxy command and parse its stdout as JSON
    ///
    /// The caller is responsible for passing the command's `--json` flag.
    #[instrument(skip(self), fields(cmd = %args.join(" ")))]
    pub async fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> CliResult<T> {
        let stdout = self.execute(args).await?;
        let parsed: T = serde_json::from_slice(&stdout)?;
        Ok(parsed)
    }

    async fn execute(&self, args: &[&str]) -> CliResult<Vec<u8>> {
        debug!("executing: {} {}", self.program.display(), args.join(" "));

        let child = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CliError::NotFound
                } else {
                    CliError::SpawnError(e)
                }
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_elapsed) => {
                error!(timeout = ?self.timeout, "styxy command timed out");
                return Err(CliError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stderr = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            error!(code, stderr = %stderr, "styxy command failed");
            return Err(CliError::CommandFailed { code, stderr });
        }

        Ok(output.stdout)
    }
}

impl Default for StyxyCli {
    fn default() -> Self {
        Self::new("styxy")
    }
}
