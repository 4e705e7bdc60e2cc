//! Logical commands sent to the Styxy daemon
//!
//! A [`Command`] is built once by the tool dispatcher and then handed to the
//! daemon channel by reference. The same value is serialized for the socket
//! path and translated into arguments for the CLI fallback path.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The command taxonomy understood by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Allocate,
    Status,
    Cleanup,
    Logs,
    Config,
    Metrics,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Allocate => "allocate",
            CommandType::Status => "status",
            CommandType::Cleanup => "cleanup",
            CommandType::Logs => "logs",
            CommandType::Config => "config",
            CommandType::Metrics => "metrics",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking: service, project, directory and assistant session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl CommandContext {
    /// Context for the given working directory and optional session
    pub fn new(working_directory: Option<PathBuf>, session_id: Option<String>) -> Self {
        Self {
            working_directory,
            session_id,
            ..Default::default()
        }
    }

    /// Project name, falling back to the working directory's basename
    pub fn resolved_project_name(&self) -> String {
        self.project_name
            .clone()
            .or_else(|| {
                self.working_directory
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "default".to_string())
    }
}

/// What the caller would like, if the daemon can oblige
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPreferences {
    /// Preferred port for allocate, specific port for cleanup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
    /// Number of log lines requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Default for CommandMetadata {
    fn default() -> Self {
        Self {
            service_name: None,
            timestamp: Utc::now(),
        }
    }
}

/// One logical request to the daemon
///
/// Serialized on the wire as
/// `{"command":"allocate","context":{..},"preferences":{..},"metadata":{..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "command")]
    kind: CommandType,
    context: CommandContext,
    preferences: CommandPreferences,
    metadata: CommandMetadata,
}

impl Command {
    fn build(
        kind: CommandType,
        context: CommandContext,
        preferences: CommandPreferences,
        service_name: Option<String>,
    ) -> Self {
        Self {
            kind,
            context,
            preferences,
            metadata: CommandMetadata {
                service_name,
                ..Default::default()
            },
        }
    }

    /// Request a port for `service_type`
    ///
    /// The project name defaults to the basename of the context's working
    /// directory when it is not given explicitly.
    pub fn allocate(
        mut context: CommandContext,
        service_type: impl Into<String>,
        preferred_port: Option<u16>,
        duration: Option<String>,
        service_name: Option<String>,
    ) -> Self {
        context.service_type = Some(service_type.into());
        context.project_name = Some(context.resolved_project_name());
        let preferences = CommandPreferences {
            port: preferred_port,
            duration,
            ..Default::default()
        };
        Self::build(CommandType::Allocate, context, preferences, service_name)
    }

    pub fn status(context: CommandContext) -> Self {
        Self::build(CommandType::Status, context, CommandPreferences::default(), None)
    }

    /// Release allocations; a specific `port` narrows the cleanup
    pub fn cleanup(context: CommandContext, force: bool, port: Option<u16>) -> Self {
        let preferences = CommandPreferences {
            port,
            force,
            ..Default::default()
        };
        Self::build(CommandType::Cleanup, context, preferences, None)
    }

    pub fn logs(context: CommandContext, lines: Option<u32>) -> Self {
        let preferences = CommandPreferences {
            lines,
            ..Default::default()
        };
        Self::build(CommandType::Logs, context, preferences, None)
    }

    pub fn config(context: CommandContext) -> Self {
        Self::build(CommandType::Config, context, CommandPreferences::default(), None)
    }

    pub fn metrics(context: CommandContext) -> Self {
        Self::build(CommandType::Metrics, context, CommandPreferences::default(), None)
    }

    pub fn kind(&self) -> CommandType {
        self.kind
    }

    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    pub fn preferences(&self) -> &CommandPreferences {
        &self.preferences
    }

    pub fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    /// Single-line JSON frame for the daemon socket, newline not included
    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_defaults_project_to_directory_name() {
        let context = CommandContext::new(Some(PathBuf::from("/home/dev/demo-app")), None);
        let command = Command::allocate(context, "web", None, None, None);

        assert_eq!(command.kind(), CommandType::Allocate);
        assert_eq!(command.context().service_type.as_deref(), Some("web"));
        assert_eq!(command.context().project_name.as_deref(), Some("demo-app"));
    }

    #[test]
    fn test_explicit_project_name_wins() {
        let context = CommandContext {
            project_name: Some("demo".to_string()),
            working_directory: Some(PathBuf::from("/srv/other")),
            ..Default::default()
        };
        let command = Command::allocate(context, "api", Some(8080), None, Some("api-1".into()));

        assert_eq!(command.context().project_name.as_deref(), Some("demo"));
        assert_eq!(command.preferences().port, Some(8080));
        assert_eq!(command.metadata().service_name.as_deref(), Some("api-1"));
    }

    #[test]
    fn test_wire_format_is_single_line_tagged_json() {
        let context = CommandContext::new(None, Some("session-42".to_string()));
        let command = Command::cleanup(context, true, Some(3001));
        let wire = command.to_wire().unwrap();

        assert!(!wire.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["command"], "cleanup");
        assert_eq!(value["context"]["session_id"], "session-42");
        assert_eq!(value["preferences"]["force"], true);
        assert_eq!(value["preferences"]["port"], 3001);
        assert!(value["metadata"]["timestamp"].is_string());
    }

    #[test]
    fn test_force_is_omitted_when_false() {
        let command = Command::cleanup(CommandContext::default(), false, None);
        let value: serde_json::Value = serde_json::from_str(&command.to_wire().unwrap()).unwrap();

        assert!(value["preferences"].get("force").is_none());
    }
}
