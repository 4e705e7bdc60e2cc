//! Parsers for human-readable styxy CLI output
//!
//! # Grammar
//!
//! `allocate`: the first line containing a port marker (`Port: 3042`,
//! `port 3042`, `localhost:3042`) supplies the allocated port.
//!
//! `status` (plain text):
//! ```text
//! PID: <n>
//! Uptime: <text>
//! Config: <path>
//! Log: <path>            (also "Logs:" / "Log file:")
//!   <port> - <description>
//! ```
//! A line mentioning "not running" marks the daemon as down.
//!
//! `cleanup`: every `Released port <n>` occurrence, in order.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ActivePort, StatusResult};

static PORT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bport\b\s*[:#]?\s*|localhost:)(\d{1,5})\b").expect("Invalid regex")
});

static PORT_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,5})\s+-\s+(.+?)\s*$").expect("Invalid regex"));

static RELEASED_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Released port (\d{1,5})").expect("Invalid regex"));

fn parse_port(digits: &str) -> Option<u16> {
    digits.parse::<u16>().ok().filter(|port| *port != 0)
}

/// Port from the first line carrying a port marker
pub fn parse_allocated_port(output: &str) -> Option<u16> {
    output
        .lines()
        .find_map(|line| PORT_MARKER.captures(line))
        .and_then(|caps| parse_port(&caps[1]))
}

/// Line-oriented status parse; `None` when nothing recognisable was found
pub fn parse_status_text(output: &str) -> Option<StatusResult> {
    let mut status = StatusResult {
        daemon_running: true,
        ..Default::default()
    };
    let mut recognised = false;

    for line in output.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.contains("not running") {
            status.daemon_running = false;
            recognised = true;
        } else if let Some(value) = labelled(trimmed, &["PID:"]) {
            status.pid = value.parse().ok();
            recognised = true;
        } else if let Some(value) = labelled(trimmed, &["Uptime:"]) {
            status.uptime = Some(value.to_string());
            recognised = true;
        } else if let Some(value) = labelled(trimmed, &["Config:", "Config file:"]) {
            status.config_path = Some(value.to_string());
            recognised = true;
        } else if let Some(value) = labelled(trimmed, &["Log file:", "Logs:", "Log:"]) {
            status.log_path = Some(value.to_string());
            recognised = true;
        } else if let Some(caps) = PORT_ROW.captures(line) {
            if let Some(port) = parse_port(&caps[1]) {
                status.active_ports.push(ActivePort {
                    port,
                    description: caps[2].to_string(),
                });
                recognised = true;
            }
        } else if lower.contains("running") {
            recognised = true;
        }
    }

    recognised.then_some(status)
}

/// Value after the first matching label, compared case-insensitively
fn labelled<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels.iter().find_map(|label| {
        let head = line.get(..label.len())?;
        head.eq_ignore_ascii_case(label)
            .then(|| line[label.len()..].trim())
    })
}

/// All ports named in `Released port <n>` lines
pub fn parse_released_ports(output: &str) -> Vec<u16> {
    RELEASED_PORT
        .captures_iter(output)
        .filter_map(|caps| parse_port(&caps[1]))
        .collect()
}
