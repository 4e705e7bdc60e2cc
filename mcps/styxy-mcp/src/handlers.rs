//! Handler implementations for Styxy MCP tools
//!
//! Each handler builds a [`Command`], sends it through the daemon channel and
//! renders the result as text. Whether the socket or the CLI answered is not
//! visible here.

use mcp_common::{internal_error, invalid_params, text_success, CallToolResult, McpError};
use tracing::debug;

use crate::command::{Command, CommandContext};
use crate::daemon::DaemonChannel;
use crate::error::StyxyError;
use crate::format;
use crate::params::{AllocateParams, CleanupParams, LogsParams};

/// Convert a StyxyError to an MCP error
pub fn styxy_to_mcp_error(e: StyxyError) -> McpError {
    internal_error(e.to_string())
}

async fn dispatch(channel: &DaemonChannel, command: Command) -> Result<CallToolResult, McpError> {
    debug!(command = %command.kind(), "dispatching tool call");
    let result = channel.send(&command).await.map_err(styxy_to_mcp_error)?;
    Ok(text_success(format::render(&result)))
}

/// Allocate a port for a service
pub async fn allocate(
    channel: &DaemonChannel,
    mut context: CommandContext,
    params: AllocateParams,
) -> Result<CallToolResult, McpError> {
    let service_type = params.service_type.trim();
    if service_type.is_empty() {
        return Err(invalid_params("service_type cannot be empty"));
    }
    if params.preferred_port == Some(0) {
        return Err(invalid_params("preferred_port must be between 1 and 65535"));
    }
    if let Some(project) = params.project_name.filter(|p| !p.trim().is_empty()) {
        context.project_name = Some(project);
    }

    let command = Command::allocate(
        context,
        service_type,
        params.preferred_port,
        params.duration,
        params.service_name,
    );
    dispatch(channel, command).await
}

/// Report daemon health and active allocations
pub async fn status(
    channel: &DaemonChannel,
    context: CommandContext,
) -> Result<CallToolResult, McpError> {
    dispatch(channel, Command::status(context)).await
}

/// Release stale or specific allocations
pub async fn cleanup(
    channel: &DaemonChannel,
    context: CommandContext,
    params: CleanupParams,
) -> Result<CallToolResult, McpError> {
    if params.port == Some(0) {
        return Err(invalid_params("port must be between 1 and 65535"));
    }
    dispatch(channel, Command::cleanup(context, params.force, params.port)).await
}

/// Recent daemon log lines
pub async fn logs(
    channel: &DaemonChannel,
    context: CommandContext,
    params: LogsParams,
) -> Result<CallToolResult, McpError> {
    dispatch(channel, Command::logs(context, params.lines)).await
}

/// Daemon configuration as JSON
pub async fn config(
    channel: &DaemonChannel,
    context: CommandContext,
) -> Result<CallToolResult, McpError> {
    dispatch(channel, Command::config(context)).await
}

/// Daemon metrics as JSON
pub async fn metrics(
    channel: &DaemonChannel,
    context: CommandContext,
) -> Result<CallToolResult, McpError> {
    dispatch(channel, Command::metrics(context)).await
}
