//! Parameter types for Styxy MCP tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for allocating a port
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AllocateParams {
    #[schemars(description = "Kind of service the port is for (e.g., 'dev', 'api', 'storybook', 'test')")]
    pub service_type: String,

    #[schemars(description = "Project the allocation belongs to. Defaults to the working directory name")]
    pub project_name: Option<String>,

    #[schemars(description = "Port to try first; the daemon picks another if it is taken")]
    pub preferred_port: Option<u16>,

    #[schemars(description = "How long to hold the allocation (e.g., '30m', '2h')")]
    pub duration: Option<String>,

    #[schemars(description = "Human-readable name for the service instance")]
    pub service_name: Option<String>,
}

/// Parameters for releasing allocations
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct CleanupParams {
    #[schemars(description = "Release allocations even when their owning process still looks alive")]
    #[serde(default)]
    pub force: bool,

    #[schemars(description = "Only release this port")]
    pub port: Option<u16>,
}

/// Parameters for reading daemon logs
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct LogsParams {
    #[schemars(description = "Number of recent log lines to return")]
    pub lines: Option<u32>,
}
