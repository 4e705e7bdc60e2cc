//! Daemon channel
//!
//! Sends [`Command`](crate::command::Command)s to the Styxy daemon over its
//! Unix socket, one JSON line per request, and falls back to the styxy CLI
//! when the socket path fails.
//!
//! # Pipeline
//!
//! ```text
//! send(command)
//!   ├─ socket stage ── ok ───────────────────────────→ CommandResult
//!   │      │
//!   │      └─ ChannelError (connect/timeout/decode/io)
//!   │                 │
//!   └─ fallback stage ┴─ CliFallback::translate ──────→ CommandResult | StyxyError
//! ```

mod channel;
mod error;
mod framing;

pub use channel::{ChannelTimeouts, ConnectionState, DaemonChannel};
pub use error::ChannelError;
pub use framing::FrameBuffer;
