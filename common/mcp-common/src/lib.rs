//! MCP Common - Shared utilities for MCP servers
//!
//! - **Initialization**: [`init_tracing`] and [`serve_stdio_until`]
//! - **Results**: [`text_success`] for tool responses
//! - **Errors**: [`internal_error`] and [`invalid_params`]
//!
//! # Example
//!
//! ```rust,ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     mcp_common::init_tracing("my_mcp")?;
//!     mcp_common::serve_stdio_until(MyServer::new(), async {
//!         tokio::signal::ctrl_c().await.ok();
//!     })
//!     .await
//! }
//! ```

pub mod error;
pub mod init;
pub mod result;

// Re-export commonly used items at crate root
pub use error::{internal_error, invalid_params};
pub use init::{init_tracing, serve_stdio_until};
pub use result::text_success;

// Re-export rmcp types that are commonly needed
pub use rmcp::{model::CallToolResult, ErrorData as McpError};
