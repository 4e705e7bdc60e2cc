//! Error types for styxy CLI invocations

use std::time::Duration;

use thiserror::Error;

/// Ways a single `styxy` invocation can fail
///
/// Raised by [`StyxyCli`](super::StyxyCli); the CLI fallback wraps them in
/// `StyxyError::CliInvocationFailed` together with the command being run.
#[derive(Error, Debug)]
pub enum CliError {
    /// `styxy` exited non-zero, e.g. a port already taken or a bad argument
    ///
    /// styxy prints some refusals on stdout, so `stderr` carries stdout when
    /// nothing was written to stderr.
    #[error("styxy command failed (exit code {code}): {stderr}")]
    CommandFailed {
        /// Exit code, or -1 when the process was killed by a signal
        code: i32,
        stderr: String,
    },

    /// The launcher program exists but could not be started
    #[error("failed to spawn styxy process: {0}")]
    SpawnError(#[from] std::io::Error),

    /// A `--json` invocation printed something other than the expected JSON
    #[error("failed to parse styxy JSON output: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The launcher program (`styxy`, or e.g. `npx` when configured) is not on PATH
    #[error("styxy CLI not found - install it with: npm install -g styxy")]
    NotFound,

    /// Still running at the deadline; the child was killed
    #[error("styxy command timed out after {0:?}")]
    Timeout(Duration),
}

pub type CliResult<T> = Result<T, CliError>;
