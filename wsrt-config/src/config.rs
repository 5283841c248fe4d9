//! Structure of `~/.wsrt/config.yaml`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use wsrt_core::AgentCapability;

/// Recipe types the engine understands out of the box.
pub const KNOWN_RECIPE_TYPES: &[&str] = &["compose", "dockerfile", "dockerimage", "openshift"];

/// Root of the engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    /// How the workspace-agent machine is recognised
    #[serde(default, skip_serializing_if = "is_default_agent")]
    pub agent: AgentCapability,

    #[serde(default, skip_serializing_if = "RecipeSettings::is_default")]
    pub recipes: RecipeSettings,

    #[serde(default, skip_serializing_if = "DockerSettings::is_default")]
    pub docker: DockerSettings,

    /// Installer id to the shell script that installs it inside a machine
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub installers: IndexMap<String, String>,
}

fn is_default_agent(agent: &AgentCapability) -> bool {
    *agent == AgentCapability::default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSettings {
    /// Recipe types accepted by the environment registry
    #[serde(default = "default_enabled_recipes")]
    pub enabled: Vec<String>,
}

fn default_enabled_recipes() -> Vec<String> {
    KNOWN_RECIPE_TYPES.iter().map(|t| t.to_string()).collect()
}

impl Default for RecipeSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled_recipes(),
        }
    }
}

impl RecipeSettings {
    pub fn is_default(&self) -> bool {
        self.enabled == default_enabled_recipes()
    }

    pub fn is_enabled(&self, recipe_type: &str) -> bool {
        self.enabled.iter().any(|t| t == recipe_type)
    }
}

/// Settings of the reference Docker adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerSettings {
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Prefix of the per-runtime bridge network
    #[serde(default = "default_network_prefix")]
    pub network_prefix: String,

    /// Readiness probes per machine before giving up
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,

    #[serde(default = "default_ready_interval_ms")]
    pub ready_interval_ms: u64,
}

fn default_binary() -> String {
    "docker".to_string()
}

fn default_network_prefix() -> String {
    "wsrt".to_string()
}

fn default_ready_attempts() -> u32 {
    30
}

fn default_ready_interval_ms() -> u64 {
    1000
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            network_prefix: default_network_prefix(),
            ready_attempts: default_ready_attempts(),
            ready_interval_ms: default_ready_interval_ms(),
        }
    }
}

impl DockerSettings {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl RuntimeConfig {
    /// Applies `WSRT_AGENT_SERVER`, `WSRT_AGENT_INSTALLER` and `WSRT_DOCKER_BIN`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(server) = lookup("WSRT_AGENT_SERVER").filter(|v| !v.is_empty()) {
            self.agent.server_reference = server;
        }
        if let Some(installer) = lookup("WSRT_AGENT_INSTALLER").filter(|v| !v.is_empty()) {
            self.agent.installer = installer;
        }
        if let Some(binary) = lookup("WSRT_DOCKER_BIN").filter(|v| !v.is_empty()) {
            self.docker.binary = binary;
        }
    }
}
