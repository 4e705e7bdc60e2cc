//! Styxy MCP Server
//!
//! Exposes Styxy port coordination to AI assistants over MCP stdio.
//!
//! # Startup
//! 1. Claim the singleton lock (one adapter per user)
//! 2. Resolve the daemon configuration
//! 3. Serve tools until the client disconnects or SIGINT/SIGTERM arrives
//!
//! # Requirements
//! - `styxy` CLI installed (`npm install -g styxy`)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use tracing::{error, info};

use styxy_mcp::daemon::ChannelTimeouts;
use styxy_mcp::singleton::default_lock_path;
use styxy_mcp::{
    CliFallback, ConfigResolver, DaemonChannel, ShutdownHooks, SingletonLock, StyxyCli,
    StyxyMcpServer,
};

#[derive(Parser, Debug)]
#[command(name = "styxy-mcp")]
#[command(about = "MCP server for Styxy port coordination")]
struct Args {
    /// styxy executable
    #[arg(long, env = "STYXY_CLI", default_value = "styxy")]
    cli: PathBuf,

    /// Arguments placed before every styxy command (e.g. `--cli npx --cli-arg styxy`)
    #[arg(long = "cli-arg", allow_hyphen_values = true)]
    cli_args: Vec<String>,

    /// Daemon socket, overriding the resolved configuration
    #[arg(long, env = "STYXY_SOCKET_PATH")]
    socket_path: Option<PathBuf>,

    /// Singleton lock file
    #[arg(long, env = "STYXY_MCP_LOCK")]
    lock_path: Option<PathBuf>,

    /// Assistant session identifier attached to every command
    #[arg(long, env = "STYXY_SESSION_ID")]
    session_id: Option<String>,

    #[arg(long, default_value_t = 5)]
    connect_timeout_secs: u64,

    #[arg(long, default_value_t = 10)]
    call_timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    cli_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    mcp_common::init_tracing("styxy_mcp")?;

    info!("Starting styxy_mcp MCP Server");

    let lock = Arc::new(SingletonLock::new(
        args.lock_path.clone().unwrap_or_else(default_lock_path),
    ));
    if !lock.acquire() {
        match lock.holder_info() {
            Some(holder) => error!(
                pid = holder.pid,
                host = %holder.hostname,
                started = %holder.started,
                "Another styxy-mcp instance holds {}",
                lock.path().display()
            ),
            None => error!("Could not claim lock {}", lock.path().display()),
        }
        bail!("styxy-mcp is already running (lock: {})", lock.path().display());
    }
    let hooks = ShutdownHooks::new(Arc::clone(&lock));

    let cli = StyxyCli::new(args.cli.clone())
        .with_base_args(args.cli_args.iter().cloned())
        .with_timeout(Duration::from_secs(args.cli_timeout_secs));

    info!(cli = %cli.program().display(), "Using styxy CLI");

    let mut config = ConfigResolver::new(cli.clone()).resolve().await;
    if let Some(socket_path) = args.socket_path {
        config = config.with_socket_path(socket_path);
    }
    info!(
        socket = %config.socket_path.display(),
        source = ?config.source,
        "Resolved styxy config"
    );

    let channel = DaemonChannel::new(Arc::new(config), CliFallback::new(cli)).with_timeouts(
        ChannelTimeouts {
            connect: Duration::from_secs(args.connect_timeout_secs),
            call: Duration::from_secs(args.call_timeout_secs),
        },
    );
    let server = StyxyMcpServer::new(Arc::new(channel), args.session_id);

    let result = mcp_common::serve_stdio_until(server, async {
        hooks.release_on_signal().await;
    })
    .await;

    info!("Server shutting down");
    hooks.release();
    result
}
