//! Folds the machine overlay into the containers it describes.
//!
//! Server ports become exposed ports, server metadata becomes labels and the
//! memory limit attribute becomes the container memory limit. Relations are
//! left untouched so the start order stays valid.

use wsrt_core::machine::MEMORY_LIMIT_ATTRIBUTE;
use wsrt_core::ValidationError;

use crate::model::RuntimeModel;
use crate::registry::Machines;

/// Label prefix under which server metadata is published.
pub const SERVER_LABEL_PREFIX: &str = "workspace.server";

/// `8080` becomes `8080/tcp`; ports that name their protocol are kept.
pub fn normalize_port(port: &str) -> String {
    if port.contains('/') {
        port.to_string()
    } else {
        format!("{port}/tcp")
    }
}

pub fn apply(model: &mut RuntimeModel, machines: &Machines) -> Result<(), ValidationError> {
    for (name, machine) in machines {
        let Some(container) = model.containers.get_mut(name) else {
            continue;
        };

        for (server_name, server) in &machine.servers {
            if let Some(port) = server.port.as_deref() {
                let port = normalize_port(port);
                let already_exposed = container
                    .expose
                    .iter()
                    .any(|exposed| normalize_port(exposed) == port);
                if !already_exposed {
                    container.expose.push(port.clone());
                }
                container
                    .labels
                    .insert(format!("{SERVER_LABEL_PREFIX}.{server_name}.port"), port);
            }
            if let Some(protocol) = &server.protocol {
                container.labels.insert(
                    format!("{SERVER_LABEL_PREFIX}.{server_name}.protocol"),
                    protocol.clone(),
                );
            }
            if let Some(path) = &server.path {
                container
                    .labels
                    .insert(format!("{SERVER_LABEL_PREFIX}.{server_name}.path"), path.clone());
            }
        }

        if let Some(limit) = machine.attributes.get(MEMORY_LIMIT_ATTRIBUTE) {
            let bytes = limit.trim().parse::<u64>().map_err(|_| {
                ValidationError::new(format!(
                    "Value '{limit}' of attribute '{MEMORY_LIMIT_ATTRIBUTE}' in machine '{name}' is not a number of bytes"
                ))
            })?;
            container.mem_limit = Some(bytes);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContainerConfig;
    use wsrt_core::{MachineConfig, ServerConfig};

    fn model(expose: &[&str]) -> RuntimeModel {
        let container = ContainerConfig {
            image: Some("eclipse/ubuntu_jdk8".into()),
            expose: expose.iter().map(|p| p.to_string()).collect(),
            depends_on: vec!["db".into()],
            ..Default::default()
        };
        RuntimeModel {
            containers: [("dev-machine".to_string(), container)].into_iter().collect(),
            ..Default::default()
        }
    }

    fn overlay(machine: MachineConfig) -> Machines {
        [("dev-machine".to_string(), machine)].into_iter().collect()
    }

    #[test]
    fn test_server_ports_are_exposed_once() {
        let mut model = model(&["4401"]);
        let machine = MachineConfig::default()
            .with_server("wsagent/http", ServerConfig::new("4401/tcp", Some("http"), Some("/api")))
            .with_server("terminal", ServerConfig::new("4411", Some("ws"), None))
            .with_server("dns", ServerConfig::new("53/udp", None, None));

        apply(&mut model, &overlay(machine)).unwrap();

        let container = &model.containers["dev-machine"];
        assert_eq!(container.expose, vec!["4401", "4411/tcp", "53/udp"]);
        assert_eq!(container.labels["workspace.server.wsagent/http.port"], "4401/tcp");
        assert_eq!(container.labels["workspace.server.wsagent/http.protocol"], "http");
        assert_eq!(container.labels["workspace.server.wsagent/http.path"], "/api");
        assert_eq!(container.labels["workspace.server.terminal.port"], "4411/tcp");
        assert!(!container.labels.contains_key("workspace.server.dns.protocol"));
        assert_eq!(container.depends_on, vec!["db"]);
    }

    #[test]
    fn test_memory_limit_attribute() {
        let mut model = model(&[]);
        let machine = MachineConfig::default().with_attribute(MEMORY_LIMIT_ATTRIBUTE, "2147483648");
        apply(&mut model, &overlay(machine)).unwrap();
        assert_eq!(model.containers["dev-machine"].mem_limit, Some(2147483648));

        let mut model = self::model(&[]);
        let machine = MachineConfig::default().with_attribute(MEMORY_LIMIT_ATTRIBUTE, "2g");
        let err = apply(&mut model, &overlay(machine)).unwrap_err();
        assert!(err.message().contains("'2g'"));
    }

    #[test]
    fn test_machines_without_container_are_skipped() {
        let mut model = model(&[]);
        let machines: Machines = [(
            "elsewhere".to_string(),
            MachineConfig::default().with_attribute(MEMORY_LIMIT_ATTRIBUTE, "oops"),
        )]
        .into_iter()
        .collect();
        assert!(apply(&mut model, &machines).is_ok());
    }
}
