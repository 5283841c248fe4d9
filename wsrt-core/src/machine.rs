//! Machine configuration overlay supplied alongside a recipe.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::serde_ext::option_string_or_number;

/// Server reference that marks the workspace-agent machine.
pub const WS_AGENT_SERVER_REFERENCE: &str = "wsagent/http";

/// Installer id that marks the workspace-agent machine.
pub const WS_AGENT_INSTALLER: &str = "org.eclipse.che.ws-agent";

/// Machine attribute holding the memory limit in bytes.
pub const MEMORY_LIMIT_ATTRIBUTE: &str = "memoryLimitBytes";

/// A named server a machine exposes, e.g. `wsagent/http: {port: 4401/tcp, protocol: http}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(
        default,
        deserialize_with = "option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ServerConfig {
    pub fn new(port: impl Into<String>, protocol: Option<&str>, path: Option<&str>) -> Self {
        Self {
            port: Some(port.into()),
            protocol: protocol.map(str::to_string),
            path: path.map(str::to_string),
        }
    }
}

/// Per-machine overlay: servers, installers and free-form attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MachineConfig {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub servers: IndexMap<String, ServerConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub installers: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, String>,
}

impl MachineConfig {
    pub fn with_server(mut self, name: impl Into<String>, server: ServerConfig) -> Self {
        self.servers.insert(name.into(), server);
        self
    }

    pub fn with_installer(mut self, id: impl Into<String>) -> Self {
        self.installers.push(id.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// How the workspace-agent machine is recognised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapability {
    #[serde(default = "default_server_reference")]
    pub server_reference: String,

    #[serde(default = "default_installer")]
    pub installer: String,
}

fn default_server_reference() -> String {
    WS_AGENT_SERVER_REFERENCE.to_string()
}

fn default_installer() -> String {
    WS_AGENT_INSTALLER.to_string()
}

impl Default for AgentCapability {
    fn default() -> Self {
        Self {
            server_reference: default_server_reference(),
            installer: default_installer(),
        }
    }
}

impl AgentCapability {
    /// A machine carries the agent when it declares the agent server or installs the agent.
    pub fn is_carried_by(&self, machine: &MachineConfig) -> bool {
        machine.servers.contains_key(&self.server_reference)
            || machine.installers.iter().any(|id| *id == self.installer)
    }
}
