//! Styxy MCP Library
//!
//! MCP tools for Styxy port coordination. Commands go to the Styxy daemon
//! over its Unix socket and fall back to the `styxy` CLI when the daemon is
//! unreachable.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use styxy_mcp::{CliFallback, ConfigResolver, DaemonChannel, StyxyCli, StyxyMcpServer};
//!
//! let cli = StyxyCli::default();
//! let config = ConfigResolver::new(cli.clone()).resolve().await;
//! let channel = DaemonChannel::new(Arc::new(config), CliFallback::new(cli));
//! let server = StyxyMcpServer::new(Arc::new(channel), None);
//! ```
//!
//! # Features
//! - Allocate: request a port for a service, optionally preferring one
//! - Status, cleanup and config: served by the daemon or the CLI
//! - Logs and metrics: daemon only
//! - Single instance per user via a lock file
//!
//! # Requirements
//! - `styxy` CLI installed (`npm install -g styxy`)

pub mod command;
pub mod config;
pub mod daemon;
pub mod error;
pub mod fallback;
pub mod format;
pub mod handlers;
pub mod params;
pub mod server;
pub mod shutdown;
pub mod singleton;
pub mod styxy;
pub mod types;

// Re-export main server type
pub use server::StyxyMcpServer;

pub use command::{Command, CommandContext, CommandType};
pub use config::{ConfigResolver, ConfigSource, StyxyConfig};
pub use daemon::{ChannelError, ChannelTimeouts, DaemonChannel};
pub use error::{StyxyError, StyxyResult};
pub use fallback::CliFallback;
pub use shutdown::{shutdown_signal, ShutdownHooks};
pub use singleton::SingletonLock;
pub use styxy::{CliError, StyxyCli};
pub use types::CommandResult;

// Re-export parameter types for direct API usage
pub use params::*;
