//! Result shapes returned by the daemon channel
//!
//! The field set of each result is fixed by its command type. Both the
//! socket path and the CLI fallback produce these same structs, so the
//! dispatcher never needs to know which path answered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::CommandType;

// ============================================================================
// Per-command Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateResult {
    #[serde(alias = "allocatedPort", alias = "port")]
    pub allocated_port: u16,
    #[serde(default, alias = "serviceUrl", alias = "url")]
    pub service_url: String,
    #[serde(default, alias = "serviceType")]
    pub service_type: Option<String>,
    #[serde(default, alias = "projectName", alias = "project")]
    pub project_name: Option<String>,
    #[serde(default, alias = "lockId")]
    pub lock_id: Option<String>,
}

impl AllocateResult {
    pub fn new(
        allocated_port: u16,
        service_type: Option<String>,
        project_name: Option<String>,
    ) -> Self {
        Self {
            allocated_port,
            service_url: local_url(allocated_port),
            service_type,
            project_name,
            lock_id: None,
        }
    }

    fn normalize(mut self) -> Self {
        if self.service_url.is_empty() {
            self.service_url = local_url(self.allocated_port);
        }
        self
    }
}

fn local_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

/// A row of the daemon's active port table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePort {
    pub port: u16,
    #[serde(default, alias = "service", alias = "serviceType")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    #[serde(default = "default_true", alias = "running", alias = "daemonRunning")]
    pub daemon_running: bool,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(default, alias = "configPath")]
    pub config_path: Option<String>,
    #[serde(default, alias = "logPath")]
    pub log_path: Option<String>,
    #[serde(default, alias = "activePorts", alias = "ports")]
    pub active_ports: Vec<ActivePort>,
    #[serde(default, alias = "recentErrors", alias = "errors")]
    pub recent_errors: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl StatusResult {
    /// Degraded status used when neither path could reach the daemon
    pub fn not_running(errors: Vec<String>) -> Self {
        Self {
            daemon_running: false,
            recent_errors: errors,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResult {
    #[serde(default, alias = "releasedPorts", alias = "released")]
    pub released_ports: Vec<u16>,
    /// Captured failure text; cleanup failures are reported, not raised
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsResult {
    #[serde(default, alias = "logs", alias = "entries")]
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigResult {
    pub config: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub metrics: Value,
}

// ============================================================================
// Command Result
// ============================================================================

/// A decoded daemon response, keyed by command type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandResult {
    Allocate(AllocateResult),
    Status(StatusResult),
    Cleanup(CleanupResult),
    Logs(LogsResult),
    Config(ConfigResult),
    Metrics(MetricsResult),
}

impl CommandResult {
    /// Decode a daemon payload into the canonical shape for `kind`
    ///
    /// Config and metrics payloads are kept whole when the daemon does not
    /// wrap them in a `config`/`metrics` field.
    pub fn decode(kind: CommandType, payload: Value) -> serde_json::Result<Self> {
        let result = match kind {
            CommandType::Allocate => {
                CommandResult::Allocate(serde_json::from_value::<AllocateResult>(payload)?.normalize())
            }
            CommandType::Status => CommandResult::Status(serde_json::from_value(payload)?),
            CommandType::Cleanup => CommandResult::Cleanup(serde_json::from_value(payload)?),
            CommandType::Logs => match payload {
                Value::Array(_) => CommandResult::Logs(LogsResult {
                    lines: serde_json::from_value(payload)?,
                }),
                other => CommandResult::Logs(serde_json::from_value(other)?),
            },
            CommandType::Config => CommandResult::Config(ConfigResult {
                config: unwrap_field(payload, "config"),
            }),
            CommandType::Metrics => CommandResult::Metrics(MetricsResult {
                metrics: unwrap_field(payload, "metrics"),
            }),
        };
        Ok(result)
    }

    pub fn kind(&self) -> CommandType {
        match self {
            CommandResult::Allocate(_) => CommandType::Allocate,
            CommandResult::Status(_) => CommandType::Status,
            CommandResult::Cleanup(_) => CommandType::Cleanup,
            CommandResult::Logs(_) => CommandType::Logs,
            CommandResult::Config(_) => CommandType::Config,
            CommandResult::Metrics(_) => CommandType::Metrics,
        }
    }
}

fn unwrap_field(payload: Value, field: &str) -> Value {
    match payload {
        Value::Object(mut map) if map.len() == 1 && map.contains_key(field) => {
            map.remove(field).unwrap_or(Value::Null)
        }
        other => other,
    }
}
