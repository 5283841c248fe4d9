//! Reference adapter that drives a local Docker engine through its CLI.
//!
//! Every runtime gets one bridge network; every resource carries the
//! identity labels so cleanup and watching can find it again.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{debug, info, warn};
use wsrt_config::{DockerSettings, RuntimeConfig};
use wsrt_core::validation::{link_target, volumes_from_target};
use wsrt_core::{InfrastructureError, RuntimeIdentity};
use wsrt_environment::normalize::SERVER_LABEL_PREFIX;
use wsrt_environment::{ContainerConfig, InternalEnvironment};
use wsrt_runtime::InfrastructureAdapter;

use crate::command::DockerCommand;

pub const WORKSPACE_LABEL: &str = "workspace.id";
pub const ENVIRONMENT_LABEL: &str = "workspace.env";
pub const OWNER_LABEL: &str = "workspace.owner";
pub const MACHINE_LABEL: &str = "workspace.machine";

/// TCP socket state `LISTEN` in `/proc/net/tcp`.
const TCP_LISTEN: &str = "0A";

pub struct DockerAdapter {
    settings: DockerSettings,
    installers: IndexMap<String, String>,
    // Ports to probe per runtime and machine, collected at creation time.
    probes: Mutex<HashMap<(RuntimeIdentity, String), Vec<u16>>>,
}

impl DockerAdapter {
    pub fn new(settings: DockerSettings, installers: IndexMap<String, String>) -> Self {
        Self {
            settings,
            installers,
            probes: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.docker.clone(), config.installers.clone())
    }

    fn docker(&self) -> DockerCommand {
        DockerCommand::new(&self.settings.binary)
    }

    /// One network per environment of a workspace.
    pub fn network_name(&self, identity: &RuntimeIdentity) -> String {
        format!(
            "{}-{}-{}",
            self.settings.network_prefix,
            identity.workspace_id,
            docker_safe(&identity.env_name)
        )
    }

    pub fn container_name(&self, identity: &RuntimeIdentity, machine: &str) -> String {
        format!("{}-{}", self.network_name(identity), docker_safe(machine))
    }

    fn image_tag(&self, identity: &RuntimeIdentity, machine: &str) -> String {
        format!("{}:latest", self.container_name(identity, machine)).to_lowercase()
    }

    fn identity_labels(identity: &RuntimeIdentity) -> Vec<String> {
        vec![
            format!("{WORKSPACE_LABEL}={}", identity.workspace_id),
            format!("{ENVIRONMENT_LABEL}={}", identity.env_name),
            format!("{OWNER_LABEL}={}", identity.owner),
        ]
    }

    /// `--filter` values matching every resource of one runtime.
    pub fn runtime_filters(identity: &RuntimeIdentity) -> Vec<String> {
        vec![
            format!("label={WORKSPACE_LABEL}={}", identity.workspace_id),
            format!("label={ENVIRONMENT_LABEL}={}", identity.env_name),
        ]
    }

    /// Ids listed by a quiet `ls`/`ps` over the runtime's resources.
    async fn list_ids(
        &self,
        subcommand: &str,
        list: &[&str],
        identity: &RuntimeIdentity,
    ) -> Result<Vec<String>, InfrastructureError> {
        let output = self
            .docker()
            .subcommand(subcommand)
            .args(list.iter().copied())
            .repeated("--filter", Self::runtime_filters(identity))
            .execute_with_output()
            .await?;
        let mut ids: Vec<String> = output.split_whitespace().map(str::to_string).collect();
        // Images with several tags are listed once per tag.
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Builds the image of `config` when it has a build section; returns the image to run.
    async fn ensure_image(
        &self,
        identity: &RuntimeIdentity,
        machine: &str,
        config: &ContainerConfig,
    ) -> Result<String, InfrastructureError> {
        let Some(build) = &config.build else {
            return config.image.clone().ok_or_else(|| {
                InfrastructureError::platform(format!("Machine '{machine}' has neither image nor build"))
            });
        };

        let tag = self.image_tag(identity, machine);
        let args = build
            .args
            .iter()
            .map(|(key, value)| format!("{key}={value}"));
        let command = self
            .docker()
            .subcommand("build")
            .arg("-t")
            .arg(&tag)
            .repeated("--build-arg", args)
            .repeated("--label", Self::identity_labels(identity));

        let command = match (&build.dockerfile, &build.context) {
            (Some(dockerfile), _) => command.arg("-").stdin(dockerfile.clone()),
            (None, Some(context)) => command.arg(context),
            (None, None) => {
                return Err(InfrastructureError::platform(format!(
                    "Build of machine '{machine}' has neither context nor dockerfile"
                )))
            }
        };

        info!(machine, tag = %tag, "Building image");
        command.execute().await?;
        Ok(tag)
    }

    /// Arguments of `docker run` for one machine, image and command last.
    pub fn run_command(
        &self,
        identity: &RuntimeIdentity,
        machine: &str,
        config: &ContainerConfig,
        image: &str,
    ) -> DockerCommand {
        let name = self.container_name(identity, machine);

        let links = config.links.iter().filter_map(|link| {
            let target = link_target(link)?;
            let alias = link.split_once(':').map_or(target, |(_, alias)| alias);
            Some(format!("{}:{alias}", self.container_name(identity, target)))
        });
        let volumes_from = config.volumes_from.iter().filter_map(|entry| {
            let target = volumes_from_target(entry)?;
            let container = self.container_name(identity, target);
            Some(match entry.split_once(':') {
                Some((_, mode)) => format!("{container}:{mode}"),
                None => container,
            })
        });

        let mut command = self
            .docker()
            .subcommand("run")
            .arg("-d")
            .arg("--name")
            .arg(name)
            .arg("--network")
            .arg(self.network_name(identity))
            .arg("--network-alias")
            .arg(docker_safe(machine))
            .repeated("--label", Self::identity_labels(identity))
            .arg("--label")
            .arg(format!("{MACHINE_LABEL}={machine}"))
            .repeated(
                "--label",
                config.labels.iter().map(|(key, value)| format!("{key}={value}")),
            )
            .repeated(
                "--env",
                config.environment.iter().map(|(key, value)| format!("{key}={value}")),
            )
            .repeated("--expose", config.expose.iter().cloned())
            .repeated("--link", links)
            .repeated("--volumes-from", volumes_from);

        if let Some(limit) = config.mem_limit {
            command = command.arg("--memory").arg(limit.to_string());
        }

        let mut entrypoint = config.entrypoint.iter();
        if let Some(executable) = entrypoint.next() {
            command = command.arg("--entrypoint").arg(executable);
        }

        command
            .arg(image)
            .args(entrypoint.cloned())
            .args(config.command.iter().cloned())
    }

    fn probe_ports(config: &ContainerConfig) -> Vec<u16> {
        config
            .labels
            .iter()
            .filter(|(key, _)| key.starts_with(SERVER_LABEL_PREFIX) && key.ends_with(".port"))
            .filter_map(|(_, port)| {
                let (number, protocol) = port.split_once('/').unwrap_or((port.as_str(), "tcp"));
                (protocol == "tcp").then(|| number.parse().ok()).flatten()
            })
            .collect()
    }

    async fn is_running(&self, container: &str) -> Result<bool, InfrastructureError> {
        let state = self
            .docker()
            .subcommand("inspect")
            .arg("--format")
            .arg("{{.State.Running}}")
            .arg(container)
            .execute_with_output()
            .await?;
        Ok(state.trim() == "true")
    }

    async fn listening(&self, container: &str, ports: &[u16]) -> Result<bool, InfrastructureError> {
        if ports.is_empty() {
            return Ok(true);
        }
        let sockets = self
            .docker()
            .subcommand("exec")
            .arg(container)
            .args(["sh", "-c", "cat /proc/net/tcp /proc/net/tcp6 2>/dev/null"])
            .execute_with_output()
            .await?;
        Ok(ports.iter().all(|port| is_listening(&sockets, *port)))
    }

    fn probes(&self) -> std::sync::MutexGuard<'_, HashMap<(RuntimeIdentity, String), Vec<u16>>> {
        self.probes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Replaces characters Docker rejects in names, such as `/`.
fn docker_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') { c } else { '-' })
        .collect()
}

/// Whether `/proc/net/tcp` content shows a socket listening on `port`.
pub fn is_listening(proc_net_tcp: &str, port: u16) -> bool {
    let wanted = format!("{port:04X}");
    proc_net_tcp.lines().skip_while(|l| l.trim_start().starts_with("sl")).any(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        fields.len() > 3
            && fields[3] == TCP_LISTEN
            && fields[1]
                .rsplit_once(':')
                .is_some_and(|(_, local_port)| local_port.eq_ignore_ascii_case(&wanted))
    })
}

#[async_trait]
impl InfrastructureAdapter for DockerAdapter {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn create_shared_resources(
        &self,
        identity: &RuntimeIdentity,
        env: &InternalEnvironment,
    ) -> Result<(), InfrastructureError> {
        let model = env.model();
        if !model.shared.is_empty() || model.containers.values().any(|c| c.pod.is_some()) {
            return Err(InfrastructureError::platform(
                "Docker adapter does not support pods, services or routes",
            ));
        }

        let network = self.network_name(identity);
        info!(network = %network, "Creating network");
        self.docker()
            .subcommand("network")
            .args(["create", "--driver", "bridge"])
            .repeated("--label", Self::identity_labels(identity))
            .arg(network)
            .execute()
            .await
    }

    async fn create_container(
        &self,
        identity: &RuntimeIdentity,
        name: &str,
        config: &ContainerConfig,
    ) -> Result<(), InfrastructureError> {
        let image = self.ensure_image(identity, name, config).await?;
        self.run_command(identity, name, config, &image).execute().await?;

        self.probes()
            .insert((identity.clone(), name.to_string()), Self::probe_ports(config));
        Ok(())
    }

    async fn watch(&self, identity: &RuntimeIdentity) -> Result<(), InfrastructureError> {
        let interval = Duration::from_millis(self.settings.ready_interval_ms);
        loop {
            let exited = self
                .docker()
                .subcommand("ps")
                .args(["-a", "--format", "{{.Names}}"])
                .repeated("--filter", Self::runtime_filters(identity))
                .args(["--filter", "status=exited", "--filter", "status=dead"])
                .execute_with_output()
                .await?;

            let exited: Vec<&str> = exited.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
            if !exited.is_empty() {
                return Err(InfrastructureError::platform(format!(
                    "Containers of workspace '{}' environment '{}' stopped unexpectedly: {}",
                    identity.workspace_id,
                    identity.env_name,
                    exited.join(", ")
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn cleanup(&self, identity: &RuntimeIdentity) -> Result<(), InfrastructureError> {
        let containers = self.list_ids("ps", &["-aq"], identity).await?;
        if !containers.is_empty() {
            debug!(count = containers.len(), "Removing containers");
            self.docker()
                .subcommand("rm")
                .arg("-f")
                .args(containers)
                .execute()
                .await?;
        }

        // Only images built for this runtime carry its labels.
        let images = self.list_ids("image", &["ls", "-q"], identity).await?;
        if !images.is_empty() {
            debug!(count = images.len(), "Removing built images");
            self.docker()
                .subcommand("rmi")
                .arg("-f")
                .args(images)
                .execute()
                .await?;
        }

        let network = self.network_name(identity);
        let networks = self.list_ids("network", &["ls", "-q"], identity).await?;
        if !networks.is_empty() {
            self.docker()
                .subcommand("network")
                .arg("rm")
                .args(networks)
                .execute()
                .await?;
        }

        self.probes().retain(|(owner, _), _| owner != identity);
        info!(network = %network, "Runtime resources removed");
        Ok(())
    }

    async fn bootstrap(
        &self,
        identity: &RuntimeIdentity,
        machine: &str,
        installers: &[String],
    ) -> Result<(), InfrastructureError> {
        let container = self.container_name(identity, machine);
        for installer in installers {
            let Some(script) = self.installers.get(installer) else {
                warn!(machine, installer = %installer, "No script configured for installer, skipping");
                continue;
            };
            debug!(machine, installer = %installer, "Running installer");
            self.docker()
                .subcommand("exec")
                .arg(&container)
                .args(["sh", "-c"])
                .arg(script)
                .execute()
                .await
                .map_err(|e| {
                    InfrastructureError::platform(format!(
                        "Installer '{installer}' failed on machine '{machine}': {e}"
                    ))
                })?;
        }
        Ok(())
    }

    async fn check_ready(
        &self,
        identity: &RuntimeIdentity,
        machine: &str,
    ) -> Result<(), InfrastructureError> {
        let container = self.container_name(identity, machine);
        let ports = self
            .probes()
            .get(&(identity.clone(), machine.to_string()))
            .cloned()
            .unwrap_or_default();
        let interval = Duration::from_millis(self.settings.ready_interval_ms);

        for attempt in 1..=self.settings.ready_attempts.max(1) {
            if self.is_running(&container).await? && self.listening(&container, &ports).await? {
                debug!(machine, attempt, "Machine is ready");
                return Ok(());
            }
            tokio::time::sleep(interval).await;
        }

        Err(InfrastructureError::platform(format!(
            "Machine '{machine}' is not ready after {} attempts",
            self.settings.ready_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsrt_environment::BuildContext;

    fn adapter() -> DockerAdapter {
        DockerAdapter::new(DockerSettings::default(), IndexMap::new())
    }

    fn identity() -> RuntimeIdentity {
        RuntimeIdentity::new("ws1", "default", "alice")
    }

    #[test]
    fn test_names() {
        let adapter = adapter();
        assert_eq!(adapter.network_name(&identity()), "wsrt-ws1-default");
        assert_eq!(
            adapter.container_name(&identity(), "pod/main"),
            "wsrt-ws1-default-pod-main"
        );
    }

    #[test]
    fn test_environments_of_one_workspace_are_separate() {
        let adapter = adapter();
        let default = identity();
        let staging = RuntimeIdentity::new("ws1", "staging", "alice");

        assert_ne!(adapter.network_name(&default), adapter.network_name(&staging));
        assert_ne!(
            adapter.container_name(&default, "db"),
            adapter.container_name(&staging, "db")
        );
        assert_ne!(
            DockerAdapter::runtime_filters(&default),
            DockerAdapter::runtime_filters(&staging)
        );
        assert_eq!(
            DockerAdapter::runtime_filters(&staging),
            vec!["label=workspace.id=ws1", "label=workspace.env=staging"]
        );
    }

    #[test]
    fn test_run_command() {
        let config = ContainerConfig {
            image: Some("eclipse/ubuntu_jdk8".into()),
            entrypoint: vec!["/bin/sh".into(), "-c".into()],
            command: vec!["tail -f /dev/null".into()],
            environment: [("JAVA_OPTS".to_string(), "-Xmx1g".to_string())].into_iter().collect(),
            expose: vec!["4401/tcp".into()],
            mem_limit: Some(1024),
            links: vec!["db:mysql".into(), "cache".into()],
            volumes_from: vec!["data:ro".into()],
            ..Default::default()
        };

        let argv = adapter()
            .run_command(&identity(), "dev-machine", &config, "eclipse/ubuntu_jdk8")
            .argv();
        let joined = argv.join(" ");

        assert!(joined.starts_with("run -d --name wsrt-ws1-default-dev-machine --network wsrt-ws1-default"));
        assert!(joined.contains("--label workspace.id=ws1"));
        assert!(joined.contains("--label workspace.machine=dev-machine"));
        assert!(joined.contains("--env JAVA_OPTS=-Xmx1g"));
        assert!(joined.contains("--link wsrt-ws1-default-db:mysql --link wsrt-ws1-default-cache:cache"));
        assert!(joined.contains("--volumes-from wsrt-ws1-default-data:ro"));
        assert!(joined.contains("--memory 1024"));
        assert!(joined.ends_with("--entrypoint /bin/sh eclipse/ubuntu_jdk8 -c tail -f /dev/null"));
    }

    #[test]
    fn test_probe_ports_from_server_labels() {
        let config = ContainerConfig {
            labels: [
                ("workspace.server.wsagent/http.port", "4401/tcp"),
                ("workspace.server.wsagent/http.protocol", "http"),
                ("workspace.server.dns.port", "53/udp"),
                ("app.port", "9000"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            build: Some(BuildContext::default()),
            ..Default::default()
        };
        assert_eq!(DockerAdapter::probe_ports(&config), vec![4401]);
    }

    #[test]
    fn test_is_listening() {
        let proc_net = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n   \
0: 00000000:1131 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 1 1 0 100 0 0 10 0\n   \
1: 0100007F:1F90 0100007F:D2A4 01 00000000:00000000 00:00000000 00000000     0        0 2 1 0 20 4 30 10 -1\n";
        assert!(is_listening(proc_net, 4401));
        assert!(!is_listening(proc_net, 8080));
        assert!(!is_listening("", 4401));
    }

    /// Stand-in `docker` that records its arguments and lists one resource of each kind.
    #[cfg(unix)]
    fn recording_docker(dir: &std::path::Path) -> (String, std::path::PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("calls.log");
        let script = dir.join("docker");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$*\" >> '{}'\ncase \"$1\" in\n  ps) echo c1 ;;\n  image) echo img1; echo img1 ;;\n  network) [ \"$2\" = ls ] && echo net1 ;;\nesac\nexit 0\n",
                log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script.to_string_lossy().into_owned(), log)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cleanup_removes_runtime_containers_images_and_network() {
        let dir = tempfile::tempdir().unwrap();
        let (binary, log) = recording_docker(dir.path());
        let settings = DockerSettings {
            binary,
            ..DockerSettings::default()
        };
        let adapter = DockerAdapter::new(settings, IndexMap::new());

        adapter
            .cleanup(&RuntimeIdentity::new("ws1", "staging", "alice"))
            .await
            .unwrap();

        let calls: Vec<String> = std::fs::read_to_string(log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        let filters = "--filter label=workspace.id=ws1 --filter label=workspace.env=staging";
        assert_eq!(
            calls,
            vec![
                format!("ps -aq {filters}"),
                "rm -f c1".to_string(),
                format!("image ls -q {filters}"),
                "rmi -f img1".to_string(),
                format!("network ls -q {filters}"),
                "network rm net1".to_string(),
            ]
        );
    }
}
