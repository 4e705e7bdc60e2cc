//! Error helpers for MCP tool handlers

use rmcp::ErrorData as McpError;

/// Create an internal error with a message
///
/// Use this for failures the caller cannot fix by changing arguments.
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}

/// Create an invalid params error with a message
///
/// ```rust,ignore
/// if service_type.is_empty() {
///     return Err(invalid_params("service_type cannot be empty"));
/// }
/// ```
pub fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}
