//! CLI fallback translation
//!
//! Maps a [`Command`] onto a `styxy` CLI invocation and turns the output
//! back into the same [`CommandResult`] shape the socket path produces.
//!
//! | command  | invocation                                                        |
//! |----------|-------------------------------------------------------------------|
//! | allocate | `allocate --service-type <s> --project <p> [--preferred-port <n>] [--duration <d>]` |
//! | status   | `status --json`, then `status`                                    |
//! | cleanup  | `cleanup [--force] [--port <n>]`                                  |
//! | config   | `config show --json`                                              |
//!
//! `logs` and `metrics` have no CLI equivalent.

pub mod parser;

use serde_json::Value;
use tracing::{debug, warn};

use crate::command::{Command, CommandType};
use crate::error::{StyxyError, StyxyResult};
use crate::styxy::StyxyCli;
use crate::types::{
    AllocateResult, CleanupResult, CommandResult, ConfigResult, StatusResult,
};

/// Re-issues commands through the styxy CLI
#[derive(Debug, Clone)]
pub struct CliFallback {
    cli: StyxyCli,
}

impl CliFallback {
    pub fn new(cli: StyxyCli) -> Self {
        Self { cli }
    }

    /// Run `command` through the CLI
    ///
    /// Fails for allocate and config when the CLI fails; status and cleanup
    /// describe CLI failures inside their result instead.
    pub async fn translate(&self, command: &Command) -> StyxyResult<CommandResult> {
        debug!(command = %command.kind(), "translating command to styxy CLI");
        match command.kind() {
            CommandType::Allocate => self.allocate(command).await.map(CommandResult::Allocate),
            CommandType::Status => Ok(CommandResult::Status(self.status().await)),
            CommandType::Cleanup => Ok(CommandResult::Cleanup(self.cleanup(command).await)),
            CommandType::Config => self.config().await.map(CommandResult::Config),
            unsupported @ (CommandType::Logs | CommandType::Metrics) => {
                Err(StyxyError::TranslationUnsupported(unsupported))
            }
        }
    }

    async fn allocate(&self, command: &Command) -> StyxyResult<AllocateResult> {
        let context = command.context();
        let preferences = command.preferences();

        let service_type = context.service_type.clone().unwrap_or_default();
        let project = context.resolved_project_name();
        let mut args = vec![
            "allocate",
            "--service-type",
            service_type.as_str(),
            "--project",
            project.as_str(),
        ];

        let port_str;
        if let Some(port) = preferences.port {
            port_str = port.to_string();
            args.extend(["--preferred-port", port_str.as_str()]);
        }
        if let Some(ref duration) = preferences.duration {
            args.extend(["--duration", duration.as_str()]);
        }

        let output = self
            .cli
            .run(&args)
            .await
            .map_err(|source| StyxyError::CliInvocationFailed {
                command: CommandType::Allocate,
                source,
            })?;

        let port = parser::parse_allocated_port(&output).ok_or_else(|| {
            StyxyError::CliOutputUnparseable {
                command: CommandType::Allocate,
                output: output.clone(),
            }
        })?;

        Ok(AllocateResult::new(port, Some(service_type), Some(project)))
    }

    async fn status(&self) -> StatusResult {
        let json_error = match self.cli.run_json::<StatusResult>(&["status", "--json"]).await {
            Ok(status) => return status,
            Err(e) => e.to_string(),
        };
        debug!("styxy status --json failed, retrying as text: {}", json_error);

        match self.cli.run(&["status"]).await {
            Ok(output) => match parser::parse_status_text(&output) {
                Some(status) => status,
                None => {
                    warn!("Unrecognised styxy status output");
                    StatusResult::not_running(vec![
                        json_error,
                        format!("unrecognised status output: {}", output),
                    ])
                }
            },
            Err(e) => {
                warn!("styxy status failed: {}", e);
                StatusResult::not_running(vec![json_error, e.to_string()])
            }
        }
    }

    async fn cleanup(&self, command: &Command) -> CleanupResult {
        let preferences = command.preferences();
        let mut args = vec!["cleanup"];

        if preferences.force {
            args.push("--force");
        }
        let port_str;
        if let Some(port) = preferences.port {
            port_str = port.to_string();
            args.extend(["--port", port_str.as_str()]);
        }

        match self.cli.run(&args).await {
            Ok(output) => CleanupResult {
                released_ports: parser::parse_released_ports(&output),
                error: None,
            },
            Err(e) => {
                warn!("styxy cleanup failed: {}", e);
                CleanupResult {
                    released_ports: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn config(&self) -> StyxyResult<ConfigResult> {
        let config: Value = self
            .cli
            .run_json(&["config", "show", "--json"])
            .await
            .map_err(|source| StyxyError::CliInvocationFailed {
                command: CommandType::Config,
                source,
            })?;
        Ok(ConfigResult { config })
    }
}
