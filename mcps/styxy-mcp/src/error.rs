//! Caller-visible errors
//!
//! Socket failures never reach the caller: they are recovered by the CLI
//! fallback. What remains are failures with no further path to try, and each
//! message ends with a hint the user can act on.

use thiserror::Error;

use crate::command::CommandType;
use crate::styxy::CliError;

/// Command that starts the daemon, named in remediation hints
pub const DAEMON_START_HINT: &str = "styxy daemon start";

#[derive(Error, Debug)]
pub enum StyxyError {
    /// The daemon was unreachable and the command has no CLI equivalent
    #[error(
        "'{0}' is unsupported in fallback mode and the daemon is unreachable. \
         Start the daemon with `{hint}` and retry.",
        hint = DAEMON_START_HINT
    )]
    TranslationUnsupported(CommandType),

    /// The styxy CLI could not complete the command
    #[error(
        "styxy {command} failed: {source}. Check that styxy is installed and \
         the daemon is running (`{hint}`).",
        hint = DAEMON_START_HINT
    )]
    CliInvocationFailed {
        command: CommandType,
        #[source]
        source: CliError,
    },

    /// The CLI ran but its output could not be understood
    #[error(
        "could not parse styxy {command} output: {output:?}. Run `styxy {command}` \
         manually to inspect the result."
    )]
    CliOutputUnparseable { command: CommandType, output: String },
}

pub type StyxyResult<T> = Result<T, StyxyError>;
