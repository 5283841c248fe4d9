//! Infrastructure-agnostic runtime model produced from every recipe format.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Everything needed to build one container image from source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Inline Dockerfile content, exclusive with `context`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub args: IndexMap<String, String>,
}

/// One container to create, keyed by machine name in [`RuntimeModel::containers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContainerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expose: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_limit: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes_from: Vec<String>,

    /// Owning pod, for containers that come from pod specifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
}

/// A platform service selecting pods by label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlatformService {
    pub name: String,

    #[serde(default)]
    pub selector: IndexMap<String, String>,

    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServicePort {
    pub port: u16,
    /// Container port number or name
    pub target_port: String,
    pub protocol: String,
}

/// An externally reachable route to a platform service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlatformRoute {
    pub name: String,
    pub service: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<String>,
}

/// Resources that exist once per runtime and are created before any container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SharedResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<PlatformService>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<PlatformRoute>,
}

impl SharedResources {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.routes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RuntimeModel {
    pub containers: IndexMap<String, ContainerConfig>,

    #[serde(default, skip_serializing_if = "SharedResources::is_empty")]
    pub shared: SharedResources,
}
