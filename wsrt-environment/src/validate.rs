//! Environment validation.
//!
//! The common phase checks the machine overlay; the format phase checks the
//! parsed recipe against it. Nothing here mutates its input, and every check
//! reports all offenders of its category in one message.

use wsrt_core::error::check_argument;
use wsrt_core::validation::{
    is_valid_expose, is_valid_machine_name, is_valid_server_port, is_valid_server_protocol,
    link_target, volumes_from_target,
};
use wsrt_core::{AgentCapability, MachineConfig, ValidationError};

use crate::recipe::compose::{ComposeRecipe, ComposeService};
use crate::recipe::openshift::OpenShiftRecipe;
use crate::registry::Machines;

/// Checks shared by every recipe format.
#[derive(Debug, Clone, Default)]
pub struct MachineValidator {
    agent: AgentCapability,
}

impl MachineValidator {
    pub fn new(agent: AgentCapability) -> Self {
        Self { agent }
    }

    pub fn validate(&self, machines: &Machines) -> Result<(), ValidationError> {
        check_argument(!machines.is_empty(), || {
            "Environment should contain at least 1 machine".to_string()
        })?;

        for (name, machine) in machines {
            validate_machine(name, machine)?;
        }

        let with_agent: Vec<&str> = machines
            .iter()
            .filter(|(_, machine)| self.agent.is_carried_by(machine))
            .map(|(name, _)| name.as_str())
            .collect();

        check_argument(with_agent.len() == 1, || {
            format!(
                "Environment should contain exactly 1 machine with wsagent, but contains '{}'. All machines with this agent: {}",
                with_agent.len(),
                with_agent.join(", ")
            )
        })
    }
}

fn validate_machine(name: &str, machine: &MachineConfig) -> Result<(), ValidationError> {
    check_argument(is_valid_machine_name(name), || {
        format!("Name of machine '{name}' in environment is invalid")
    })?;

    for (server_name, server) in &machine.servers {
        let port = server.port.as_deref().unwrap_or_default();
        check_argument(is_valid_server_port(port), || {
            format!(
                "Machine '{name}' in environment contains server conf '{server_name}' with invalid port '{port}'"
            )
        })?;

        if let Some(protocol) = server.protocol.as_deref() {
            check_argument(is_valid_server_protocol(protocol), || {
                format!(
                    "Machine '{name}' in environment contains server conf '{server_name}' with invalid protocol '{protocol}'"
                )
            })?;
        }
    }

    Ok(())
}

pub fn validate_compose(recipe: &ComposeRecipe, machines: &Machines) -> Result<(), ValidationError> {
    check_argument(!recipe.services.is_empty(), || {
        "Environment should contain at least 1 service".to_string()
    })?;

    let missing: Vec<&str> = machines
        .keys()
        .filter(|name| !recipe.services.contains_key(name.as_str()))
        .map(String::as_str)
        .collect();
    check_argument(missing.is_empty(), || {
        format!(
            "Environment contains machines that are missing in environment recipe: {}",
            missing.join(", ")
        )
    })?;

    for (name, service) in &recipe.services {
        validate_service(name, service, recipe)?;
    }

    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}

fn validate_service(
    name: &str,
    service: &ComposeService,
    recipe: &ComposeRecipe,
) -> Result<(), ValidationError> {
    check_argument(is_valid_machine_name(name), || {
        format!("Name of machine '{name}' in environment is invalid")
    })?;

    let build = service.build.as_ref();
    let context = build.and_then(|b| b.context.as_deref());
    let dockerfile = build.and_then(|b| b.dockerfile.as_deref());

    check_argument(
        !is_blank(service.image.as_deref()) || !is_blank(context) || !is_blank(dockerfile),
        || format!("Field 'image' or 'build.context' is required in machine '{name}' in environment"),
    )?;

    check_argument(build.is_none() || is_blank(context) != is_blank(dockerfile), || {
        format!(
            "Machine '{name}' in environment contains mutually exclusive dockerfile content and build context."
        )
    })?;

    for expose in &service.expose {
        check_argument(is_valid_expose(expose), || {
            format!("Exposed port '{expose}' in machine '{name}' in environment is invalid")
        })?;
    }

    for link in &service.links {
        let target = link_target(link).ok_or_else(|| {
            ValidationError::new(format!(
                "Link '{link}' in machine '{name}' in environment is invalid"
            ))
        })?;
        check_argument(target != name, || {
            format!("Container '{name}' has illegal link to itself")
        })?;
        check_argument(recipe.services.contains_key(target), || {
            format!("Machine '{name}' in environment contains link to non existing machine '{target}'")
        })?;
    }

    for dependency in &service.depends_on {
        check_argument(is_valid_machine_name(dependency), || {
            format!("Dependency '{dependency}' in machine '{name}' in environment is invalid")
        })?;
        check_argument(dependency != name, || {
            format!("Container '{name}' has illegal dependency to itself")
        })?;
        check_argument(recipe.services.contains_key(dependency.as_str()), || {
            format!(
                "Machine '{name}' in environment contains dependency to non existing machine '{dependency}'"
            )
        })?;
    }

    for volumes_from in &service.volumes_from {
        let target = volumes_from_target(volumes_from).ok_or_else(|| {
            ValidationError::new(format!(
                "Machine name '{volumes_from}' in field 'volumes_from' of machine '{name}' in environment is invalid"
            ))
        })?;
        check_argument(target != name, || {
            format!("Container '{name}' can not mount volume from itself")
        })?;
        check_argument(recipe.services.contains_key(target), || {
            format!(
                "Machine '{name}' in environment contains non existing machine '{target}' in 'volumes_from' field"
            )
        })?;
    }

    check_argument(service.ports.is_empty(), || {
        format!("Ports binding is forbidden but found in machine '{name}' of environment")
    })?;
    check_argument(service.volumes.is_empty(), || {
        format!("Volumes binding is forbidden but found in machine '{name}' of environment")
    })?;
    check_argument(!service.has_networks(), || {
        format!("Networks configuration is forbidden but found in machine '{name}' of environment")
    })
}

pub fn validate_openshift(
    recipe: &OpenShiftRecipe,
    machines: &Machines,
) -> Result<(), ValidationError> {
    check_argument(recipe.pods().next().is_some(), || {
        "Environment should contain at least 1 pod".to_string()
    })?;

    let declared = recipe.machine_names();
    let missing: Vec<&str> = machines
        .keys()
        .filter(|name| !declared.contains(name))
        .map(String::as_str)
        .collect();
    check_argument(missing.is_empty(), || {
        format!(
            "Environment contains machines that are missing in recipe: {}",
            missing.join(", ")
        )
    })
}
