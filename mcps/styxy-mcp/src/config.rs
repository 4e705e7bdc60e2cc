//! Daemon connection settings
//!
//! Resolution order, first success wins:
//! 1. `styxy config show --json`
//! 2. `~/.styxy/config.json`
//! 3. `~/.config/styxy/config.json`
//! 4. `/etc/styxy/config.json`
//! 5. Built-in defaults (source marked `not_found`)
//!
//! Resolution never fails. The resolved [`StyxyConfig`] is immutable and is
//! handed to the daemon channel at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::styxy::StyxyCli;

const DEFAULT_PORT_RANGE_START: u16 = 3000;
const DEFAULT_PORT_RANGE_END: u16 = 9999;

/// Inclusive port range managed by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: DEFAULT_PORT_RANGE_START,
            end: DEFAULT_PORT_RANGE_END,
        }
    }
}

/// Where the resolved configuration came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ConfigSource {
    Cli,
    File(PathBuf),
    NotFound,
}

/// Resolved daemon connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyxyConfig {
    pub socket_path: PathBuf,
    pub port_range: PortRange,
    pub log_path: PathBuf,
    pub source: ConfigSource,
}

impl StyxyConfig {
    /// Hardcoded fallback used when nothing else resolves
    pub fn defaults() -> Self {
        let base = styxy_home();
        Self {
            socket_path: base.join("daemon.sock"),
            port_range: PortRange::default(),
            log_path: base.join("logs").join("daemon.log"),
            source: ConfigSource::NotFound,
        }
    }

    /// Replace the socket path, e.g. from `STYXY_SOCKET_PATH`
    pub fn with_socket_path(mut self, socket_path: PathBuf) -> Self {
        self.socket_path = socket_path;
        self
    }

    fn from_raw(raw: RawConfig, source: ConfigSource) -> Self {
        let defaults = Self::defaults();
        let daemon = raw.daemon.unwrap_or_default();
        let ports = raw.ports.unwrap_or_default();
        let logging = raw.logging.unwrap_or_default();

        Self {
            socket_path: raw
                .socket_path
                .or(daemon.socket_path)
                .map(expand_home)
                .unwrap_or(defaults.socket_path),
            port_range: raw.port_range.or(ports.range).unwrap_or(defaults.port_range),
            log_path: raw
                .log_path
                .or(logging.file)
                .map(expand_home)
                .unwrap_or(defaults.log_path),
            source,
        }
    }
}

fn styxy_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".styxy")
}

fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or(path),
        Err(_) => path,
    }
}

// ============================================================================
// Raw on-disk / CLI shape
// ============================================================================

/// Lenient view over the daemon's config JSON
///
/// Accepts flat keys (`socket_path`, `socketPath`) as well as the nested
/// `daemon`/`ports`/`logging` sections.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default, alias = "socket_path", alias = "socket")]
    socket_path: Option<PathBuf>,
    #[serde(default, alias = "port_range")]
    port_range: Option<PortRange>,
    #[serde(default, alias = "log_path", alias = "logFile")]
    log_path: Option<PathBuf>,
    #[serde(default)]
    daemon: Option<RawDaemon>,
    #[serde(default)]
    ports: Option<RawPorts>,
    #[serde(default)]
    logging: Option<RawLogging>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDaemon {
    #[serde(default, alias = "socket_path", alias = "socket")]
    socket_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPorts {
    #[serde(default)]
    range: Option<PortRange>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLogging {
    #[serde(default, alias = "path")]
    file: Option<PathBuf>,
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves [`StyxyConfig`] once and memoises it
#[derive(Debug)]
pub struct ConfigResolver {
    cli: StyxyCli,
    candidates: Vec<PathBuf>,
    cached: OnceCell<StyxyConfig>,
}

impl ConfigResolver {
    /// Resolver using the standard candidate file locations
    pub fn new(cli: StyxyCli) -> Self {
        Self::with_candidates(cli, default_candidates())
    }

    /// Resolver with explicit candidate files, checked in order
    pub fn with_candidates(cli: StyxyCli, candidates: Vec<PathBuf>) -> Self {
        Self {
            cli,
            candidates,
            cached: OnceCell::new(),
        }
    }

    /// Resolve the configuration; repeated calls return the cached value
    pub async fn resolve(&self) -> StyxyConfig {
        self.cached
            .get_or_init(|| self.resolve_uncached())
            .await
            .clone()
    }

    async fn resolve_uncached(&self) -> StyxyConfig {
        match self
            .cli
            .run_json::<RawConfig>(&["config", "show", "--json"])
            .await
        {
            Ok(raw) => {
                info!("Loaded styxy config from CLI");
                return StyxyConfig::from_raw(raw, ConfigSource::Cli);
            }
            Err(e) => debug!("styxy config show unavailable: {}", e),
        }

        for path in &self.candidates {
            if let Some(raw) = read_config_file(path) {
                info!("Loaded styxy config from {}", path.display());
                return StyxyConfig::from_raw(raw, ConfigSource::File(path.clone()));
            }
        }

        info!("No styxy config found, using defaults");
        StyxyConfig::defaults()
    }
}

fn read_config_file(path: &Path) -> Option<RawConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(raw) => Some(raw),
        Err(e) => {
            tracing::warn!("Failed to parse config {}: {}", path.display(), e);
            None
        }
    }
}

/// Standard config file locations, highest priority first
pub fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".styxy").join("config.json"));
        candidates.push(home.join(".config").join("styxy").join("config.json"));
    }
    candidates.push(PathBuf::from("/etc/styxy/config.json"));
    candidates
}
