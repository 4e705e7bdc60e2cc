//! Server initialization utilities
//!
//! Tracing setup and stdio serving shared by MCP server binaries.

use std::future::Future;

use rmcp::{ServerHandler, ServiceExt};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging for MCP servers
///
/// Logs go to stderr (stdout carries the MCP protocol) without ANSI colors,
/// at `info` for `crate_name` unless `RUST_LOG` says otherwise.
///
/// Set `LOG_FORMAT=json` for structured JSON output.
///
/// ```rust,ignore
/// mcp_common::init_tracing("my_mcp")?;
/// ```
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let directive = format!("{}=info", crate_name);
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    let registry = tracing_subscriber::registry().with(filter);

    if json_logs_requested(std::env::var("LOG_FORMAT").ok().as_deref()) {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    }

    Ok(())
}

fn json_logs_requested(log_format: Option<&str>) -> bool {
    log_format.is_some_and(|v| v.eq_ignore_ascii_case("json"))
}

/// Serve `server` over stdio until the client leaves or `shutdown` resolves
///
/// When `shutdown` wins, the running service is dropped, which cancels it.
///
/// ```rust,ignore
/// mcp_common::serve_stdio_until(server, async {
///     tokio::signal::ctrl_c().await.ok();
/// })
/// .await?;
/// ```
pub async fn serve_stdio_until<S, F>(server: S, shutdown: F) -> anyhow::Result<()>
where
    S: ServerHandler,
    F: Future<Output = ()>,
{
    let service = server.serve(rmcp::transport::stdio()).await?;

    info!("Server running, waiting for requests...");

    tokio::select! {
        quit = service.waiting() => {
            let reason = quit?;
            info!(?reason, "MCP client disconnected");
        }
        _ = shutdown => {
            info!("Shutdown requested, stopping MCP service");
        }
    }

    Ok(())
}
