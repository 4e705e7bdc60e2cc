//! Socket-stage errors
//!
//! These never reach the caller of `DaemonChannel::send`. Every variant,
//! `Rejected` included, hands the command over to the CLI fallback.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::error::DAEMON_START_HINT;

#[derive(Error, Debug)]
pub enum ChannelError {
    /// Daemon absent or refusing connections
    #[error(
        "styxy daemon unreachable at {path}: {source}. Start it with `{hint}`",
        hint = DAEMON_START_HINT
    )]
    ConnectionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to styxy daemon after {0:?}")]
    ConnectionTimeout(Duration),

    #[error("styxy daemon did not answer within {0:?}")]
    CallTimeout(Duration),

    /// Peer closed the socket before a complete message arrived
    #[error("styxy daemon closed the connection after {received} bytes")]
    ConnectionClosed { received: usize },

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected daemon response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The daemon answered with `success: false`
    #[error("daemon rejected the command: {0}")]
    Rejected(String),
}
