//! Text rendering of command results for tool responses

use std::fmt::Write;

use crate::types::{
    AllocateResult, CleanupResult, CommandResult, ConfigResult, LogsResult, MetricsResult,
    StatusResult,
};

/// Render a result the way the assistant sees it
pub fn render(result: &CommandResult) -> String {
    match result {
        CommandResult::Allocate(r) => render_allocate(r),
        CommandResult::Status(r) => render_status(r),
        CommandResult::Cleanup(r) => render_cleanup(r),
        CommandResult::Logs(r) => render_logs(r),
        CommandResult::Config(r) => render_config(r),
        CommandResult::Metrics(r) => render_metrics(r),
    }
}

fn render_allocate(result: &AllocateResult) -> String {
    let mut out = format!(
        "Allocated port {}\nURL: {}",
        result.allocated_port, result.service_url
    );
    if let Some(ref service_type) = result.service_type {
        let _ = write!(out, "\nService type: {}", service_type);
    }
    if let Some(ref project) = result.project_name {
        let _ = write!(out, "\nProject: {}", project);
    }
    if let Some(ref lock_id) = result.lock_id {
        let _ = write!(out, "\nLock ID: {}", lock_id);
    }
    out
}

fn render_status(result: &StatusResult) -> String {
    let mut out = String::new();
    if result.daemon_running {
        out.push_str("Styxy daemon: running");
    } else {
        out.push_str("Styxy daemon: not running (start it with `styxy daemon start`)");
    }

    if let Some(pid) = result.pid {
        let _ = write!(out, "\nPID: {}", pid);
    }
    if let Some(ref uptime) = result.uptime {
        let _ = write!(out, "\nUptime: {}", uptime);
    }
    if let Some(ref path) = result.config_path {
        let _ = write!(out, "\nConfig: {}", path);
    }
    if let Some(ref path) = result.log_path {
        let _ = write!(out, "\nLog: {}", path);
    }

    if result.active_ports.is_empty() {
        out.push_str("\n\nNo active ports");
    } else {
        let _ = write!(out, "\n\nActive ports ({}):", result.active_ports.len());
        for entry in &result.active_ports {
            let _ = write!(out, "\n  {} - {}", entry.port, entry.description);
        }
    }

    if !result.recent_errors.is_empty() {
        out.push_str("\n\nRecent errors:");
        for error in &result.recent_errors {
            let _ = write!(out, "\n  {}", error);
        }
    }
    out
}

fn render_cleanup(result: &CleanupResult) -> String {
    let mut out = if result.released_ports.is_empty() {
        "No ports released".to_string()
    } else {
        let ports: Vec<String> = result.released_ports.iter().map(u16::to_string).collect();
        format!(
            "Released {} port(s): {}",
            result.released_ports.len(),
            ports.join(", ")
        )
    };
    if let Some(ref error) = result.error {
        let _ = write!(out, "\nCleanup error: {}", error);
    }
    out
}

fn render_logs(result: &LogsResult) -> String {
    if result.lines.is_empty() {
        "No log entries".to_string()
    } else {
        result.lines.join("\n")
    }
}

fn render_config(result: &ConfigResult) -> String {
    serde_json::to_string_pretty(&result.config).unwrap_or_else(|_| result.config.to_string())
}

fn render_metrics(result: &MetricsResult) -> String {
    serde_json::to_string_pretty(&result.metrics).unwrap_or_else(|_| result.metrics.to_string())
}
