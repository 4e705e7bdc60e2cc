//! MCP Server implementation
//!
//! Exposes Styxy port coordination as tools. Every tool builds one command
//! and hands it to the shared [`DaemonChannel`]; handler implementations are
//! in the handlers module.

use std::path::PathBuf;
use std::sync::Arc;

use mcp_common::{CallToolResult, McpError};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::command::CommandContext;
use crate::daemon::DaemonChannel;
use crate::error::DAEMON_START_HINT;
use crate::handlers;
use crate::params::*;

/// The Styxy MCP Server
#[derive(Clone)]
pub struct StyxyMcpServer {
    channel: Arc<DaemonChannel>,
    session_id: Option<String>,
    working_directory: Option<PathBuf>,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool Router - Each tool delegates to its handler
// ============================================================================

#[tool_router]
impl StyxyMcpServer {
    /// Create a server rooted at the process working directory
    pub fn new(channel: Arc<DaemonChannel>, session_id: Option<String>) -> Self {
        Self {
            channel,
            session_id,
            working_directory: std::env::current_dir().ok(),
            tool_router: Self::tool_router(),
        }
    }

    /// Override the directory used to default project names
    pub fn with_working_directory(mut self, working_directory: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(working_directory.into());
        self
    }

    fn context(&self) -> CommandContext {
        CommandContext::new(self.working_directory.clone(), self.session_id.clone())
    }

    #[tool(
        description = "Allocate a port for a development service. Returns the port and its URL; \
                       prefer this over hardcoding ports"
    )]
    async fn styxy_allocate(
        &self,
        Parameters(params): Parameters<AllocateParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::allocate(&self.channel, self.context(), params).await
    }

    #[tool(description = "Show Styxy daemon health and the currently allocated ports")]
    async fn styxy_status(&self) -> Result<CallToolResult, McpError> {
        handlers::status(&self.channel, self.context()).await
    }

    #[tool(description = "Release stale port allocations, or a single port when one is given")]
    async fn styxy_cleanup(
        &self,
        Parameters(params): Parameters<CleanupParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::cleanup(&self.channel, self.context(), params).await
    }

    #[tool(description = "Read recent Styxy daemon log lines (requires a running daemon)")]
    async fn styxy_logs(
        &self,
        Parameters(params): Parameters<LogsParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::logs(&self.channel, self.context(), params).await
    }

    #[tool(description = "Show the Styxy daemon configuration")]
    async fn styxy_config(&self) -> Result<CallToolResult, McpError> {
        handlers::config(&self.channel, self.context()).await
    }

    #[tool(description = "Show Styxy daemon allocation metrics (requires a running daemon)")]
    async fn styxy_metrics(&self) -> Result<CallToolResult, McpError> {
        handlers::metrics(&self.channel, self.context()).await
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for StyxyMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(format!(
                "Styxy port coordination MCP server. Allocate ports with styxy_allocate \
                 instead of picking them by hand so parallel dev servers never collide. \
                 Talks to the Styxy daemon at {} and falls back to the styxy CLI when the \
                 daemon is unreachable. Logs and metrics need the daemon; start it with \
                 `{}`.",
                self.channel.config().socket_path.display(),
                DAEMON_START_HINT,
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyxyConfig;
    use crate::fallback::CliFallback;
    use crate::styxy::StyxyCli;
    use rmcp::model::RawContent;
    use rmcp::ServerHandler;
    use tempfile::TempDir;

    fn server(dir: &TempDir, script: &str) -> StyxyMcpServer {
        let config = StyxyConfig::defaults().with_socket_path(dir.path().join("missing.sock"));
        let cli = StyxyCli::new("sh").with_base_args(["-c", script, "styxy"]);
        let channel = DaemonChannel::new(Arc::new(config), CliFallback::new(cli));
        StyxyMcpServer::new(Arc::new(channel), Some("session-1".to_string()))
            .with_working_directory("/home/dev/demo-app")
    }

    fn text(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_lists_all_tools() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, "exit 1");
        let tools = server.tool_router.list_all();

        let tool_names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert_eq!(tools.len(), 6);
        for name in [
            "styxy_allocate",
            "styxy_status",
            "styxy_cleanup",
            "styxy_logs",
            "styxy_config",
            "styxy_metrics",
        ] {
            assert!(tool_names.contains(&name), "missing {}", name);
        }
    }

    #[test]
    fn test_instructions_name_daemon_start() {
        let dir = TempDir::new().unwrap();
        let info = server(&dir, "exit 1").get_info();
        assert!(info.instructions.unwrap().contains(DAEMON_START_HINT));
    }

    #[tokio::test]
    async fn test_allocate_defaults_project_to_working_directory() {
        let dir = TempDir::new().unwrap();
        let server = server(
            &dir,
            r#"[ "$5" = "demo-app" ] && echo 'Port: 3042' || exit 3"#,
        );

        let params = AllocateParams {
            service_type: "dev".to_string(),
            project_name: None,
            preferred_port: None,
            duration: None,
            service_name: None,
        };
        let result = server.styxy_allocate(Parameters(params)).await.unwrap();
        assert!(text(&result).contains("Allocated port 3042"));
    }

    #[tokio::test]
    async fn test_empty_service_type_is_rejected() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, "echo 'Port: 3042'");

        let params = AllocateParams {
            service_type: "  ".to_string(),
            project_name: None,
            preferred_port: None,
            duration: None,
            service_name: None,
        };
        assert!(server.styxy_allocate(Parameters(params)).await.is_err());
    }

    #[tokio::test]
    async fn test_metrics_without_daemon_is_an_error() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir, "exit 1");

        let err = server.styxy_metrics().await.unwrap_err();
        assert!(err.message.contains(DAEMON_START_HINT));
    }
}
