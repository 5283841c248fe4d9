//! Pod/service/route recipes.
//!
//! The content is a YAML list whose `items` are tagged by `kind`. Every
//! container of every pod becomes one machine.

use indexmap::IndexMap;
use serde::Deserialize;
use wsrt_core::serde_ext::option_string_or_number;
use wsrt_core::{Recipe, ValidationError, Warning};

use crate::model::{
    ContainerConfig, PlatformRoute, PlatformService, RuntimeModel, ServicePort, SharedResources,
};
use crate::registry::{Machines, RecipeFormat};
use crate::validate;

pub const TYPE: &str = "openshift";

/// Pod annotation carrying the machine name of one of its containers.
pub const MACHINE_NAME_ANNOTATION_FMT: &str = "workspace.container.{}.machine_name";

/// Pod label carrying the name the pod had before it was made unique.
pub const ORIGINAL_NAME_LABEL: &str = "workspace.original_name";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct OpenShiftRecipe {
    #[serde(default)]
    pub items: Vec<OpenShiftObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind")]
pub enum OpenShiftObject {
    Pod(Pod),
    Service(Service),
    Route(Route),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub labels: IndexMap<String, String>,

    #[serde(default)]
    pub annotations: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Container {
    pub name: String,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: Vec<EnvVar>,

    #[serde(default)]
    pub ports: Vec<ContainerPort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct EnvVar {
    pub name: String,

    #[serde(default, deserialize_with = "option_string_or_number")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,

    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Service {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct ServiceSpec {
    #[serde(default)]
    pub selector: IndexMap<String, String>,

    #[serde(default)]
    pub ports: Vec<ServicePortSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServicePortSpec {
    pub port: u16,

    /// Number or named container port
    #[serde(default, deserialize_with = "option_string_or_number")]
    pub target_port: Option<String>,

    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Route {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: RouteSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct RouteSpec {
    #[serde(default)]
    pub to: RouteTarget,

    #[serde(default)]
    pub port: Option<RoutePort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct RouteTarget {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    #[serde(default, deserialize_with = "option_string_or_number")]
    pub target_port: Option<String>,
}

impl OpenShiftRecipe {
    pub fn pods(&self) -> impl Iterator<Item = &Pod> {
        self.items.iter().filter_map(|item| match item {
            OpenShiftObject::Pod(pod) => Some(pod),
            _ => None,
        })
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.items.iter().filter_map(|item| match item {
            OpenShiftObject::Service(service) => Some(service),
            _ => None,
        })
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.items.iter().filter_map(|item| match item {
            OpenShiftObject::Route(route) => Some(route),
            _ => None,
        })
    }

    /// Machine names of every container, in declaration order.
    pub fn machine_names(&self) -> Vec<String> {
        self.pods()
            .flat_map(|pod| pod.spec.containers.iter().map(move |c| machine_name(pod, c)))
            .collect()
    }
}

/// Resolves the machine name of `container` inside `pod`.
///
/// The container-specific annotation wins, then the original pod name label
/// joined with the container name, then the pod name joined with it.
pub fn machine_name(pod: &Pod, container: &Container) -> String {
    let annotation = MACHINE_NAME_ANNOTATION_FMT.replace("{}", &container.name);
    if let Some(name) = pod.metadata.annotations.get(&annotation) {
        return name.clone();
    }
    if let Some(original) = pod.metadata.labels.get(ORIGINAL_NAME_LABEL) {
        return format!("{original}/{}", container.name);
    }
    format!("{}/{}", pod.metadata.name, container.name)
}

fn to_container(pod: &Pod, container: &Container) -> ContainerConfig {
    ContainerConfig {
        image: container.image.clone(),
        container_name: Some(container.name.clone()),
        entrypoint: container.command.clone(),
        command: container.args.clone(),
        environment: container
            .env
            .iter()
            .map(|var| (var.name.clone(), var.value.clone().unwrap_or_default()))
            .collect(),
        expose: container
            .ports
            .iter()
            .map(|port| {
                let protocol = port.protocol.as_deref().unwrap_or("tcp").to_lowercase();
                format!("{}/{protocol}", port.container_port)
            })
            .collect(),
        labels: pod.metadata.labels.clone(),
        pod: Some(pod.metadata.name.clone()),
        ..Default::default()
    }
}

pub struct OpenShiftFormat;

impl RecipeFormat for OpenShiftFormat {
    type Raw = OpenShiftRecipe;

    fn recipe_type(&self) -> &'static str {
        TYPE
    }

    fn parse(&self, recipe: &Recipe) -> Result<OpenShiftRecipe, ValidationError> {
        super::require_yaml_content_type(recipe)?;
        super::parse_yaml(&recipe.content)
    }

    fn validate(&self, raw: &OpenShiftRecipe, machines: &Machines) -> Result<(), ValidationError> {
        validate::validate_openshift(raw, machines)
    }

    fn to_internal(
        &self,
        raw: OpenShiftRecipe,
        _machines: &Machines,
        _warnings: &mut Vec<Warning>,
    ) -> Result<RuntimeModel, ValidationError> {
        let mut containers = IndexMap::new();
        for pod in raw.pods() {
            for container in &pod.spec.containers {
                let name = machine_name(pod, container);
                if containers.insert(name.clone(), to_container(pod, container)).is_some() {
                    return Err(ValidationError::new(format!(
                        "Machine '{name}' is declared more than once in recipe"
                    )));
                }
            }
        }

        let services = raw
            .services()
            .map(|service| PlatformService {
                name: service.metadata.name.clone(),
                selector: service.spec.selector.clone(),
                ports: service
                    .spec
                    .ports
                    .iter()
                    .map(|port| ServicePort {
                        port: port.port,
                        target_port: port
                            .target_port
                            .clone()
                            .unwrap_or_else(|| port.port.to_string()),
                        protocol: port.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                    })
                    .collect(),
            })
            .collect();

        let routes = raw
            .routes()
            .map(|route| PlatformRoute {
                name: route.metadata.name.clone(),
                service: route.spec.to.name.clone(),
                target_port: route.spec.port.as_ref().and_then(|p| p.target_port.clone()),
            })
            .collect();

        Ok(RuntimeModel {
            containers,
            shared: SharedResources { services, routes },
        })
    }
}
