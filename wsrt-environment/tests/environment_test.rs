//! End-to-end environment creation through the registry: parsing, both
//! validation phases, start ordering and normalization.

use wsrt_config::RuntimeConfig;
use wsrt_core::machine::WS_AGENT_SERVER_REFERENCE;
use wsrt_core::warning::{EXTRA_MACHINES_IGNORED, UNKNOWN_COMPOSE_FIELD};
use wsrt_core::{MachineConfig, Recipe, ServerConfig};
use wsrt_environment::{EnvironmentRegistry, Machines};

fn agent() -> MachineConfig {
    MachineConfig::default().with_server(
        WS_AGENT_SERVER_REFERENCE,
        ServerConfig::new("4401/tcp", Some("http"), Some("/api")),
    )
}

fn overlay(agent_machine: &str) -> Machines {
    let mut machines = Machines::new();
    machines.insert(agent_machine.to_string(), agent());
    machines
}

fn compose(content: &str) -> Recipe {
    Recipe::new("compose", Some("application/x-yaml"), content)
}

#[test]
fn test_depends_on_chain_order() {
    let recipe = compose(
        r#"
services:
  first:
    image: busybox
  second:
    image: busybox
    depends_on: [first]
  third:
    image: busybox
    depends_on: [first, second]
  forth:
    image: busybox
    depends_on: [third]
  fifth:
    image: busybox
    depends_on: [forth, first]
"#,
    );

    let env = EnvironmentRegistry::default()
        .create(recipe, overlay("first"))
        .expect("environment should be created");

    assert_eq!(
        env.start_order().names(),
        ["first", "second", "third", "forth", "fifth"]
    );
}

#[test]
fn test_unrelated_services_are_a_permutation() {
    let recipe = compose(
        r#"
services:
  second: {image: busybox}
  fifth: {image: busybox}
  first: {image: busybox}
  forth: {image: busybox}
  third: {image: busybox}
"#,
    );

    let env = EnvironmentRegistry::default()
        .create(recipe, overlay("first"))
        .unwrap();

    let mut names = env.start_order().names().to_vec();
    assert_eq!(names.len(), 5);
    names.sort();
    names.dedup();
    assert_eq!(names, ["fifth", "first", "forth", "second", "third"]);
}

#[test]
fn test_mutual_dependency_is_circular() {
    let recipe = compose(
        r#"
services:
  a:
    image: busybox
    depends_on: [b]
  b:
    image: busybox
    depends_on: [a]
"#,
    );

    let err = EnvironmentRegistry::default()
        .create(recipe, overlay("a"))
        .unwrap_err();
    assert!(err.message().contains("Circular dependency"), "{err}");
    assert!(err.message().contains("a, b"));
}

#[test]
fn test_compose_environment_is_normalized() {
    let recipe = compose(
        r#"
services:
  db:
    image: mysql
    restart: always
  dev-machine:
    image: eclipse/ubuntu_jdk8
    links: ["db:mysql"]
    expose: [8080]
"#,
    );
    let mut machines = overlay("dev-machine");
    machines.insert(
        "db".to_string(),
        MachineConfig::default()
            .with_server("mysql", ServerConfig::new("3306", None, None))
            .with_attribute("memoryLimitBytes", "536870912"),
    );

    let env = EnvironmentRegistry::default()
        .create(recipe, machines)
        .unwrap();

    assert_eq!(env.start_order().names(), ["db", "dev-machine"]);

    let dev = &env.model().containers["dev-machine"];
    assert_eq!(dev.expose, vec!["8080", "4401/tcp"]);
    assert_eq!(dev.links, vec!["db:mysql"]);
    assert_eq!(dev.labels["workspace.server.wsagent/http.path"], "/api");

    let db = &env.model().containers["db"];
    assert_eq!(db.mem_limit, Some(536870912));
    assert_eq!(db.expose, vec!["3306/tcp"]);

    assert_eq!(env.warnings().len(), 1);
    assert_eq!(env.warnings()[0].code, UNKNOWN_COMPOSE_FIELD);
}

#[test]
fn test_parsing_twice_is_equal() {
    let content = r#"
services:
  dev-machine:
    image: eclipse/ubuntu_jdk8
    volumes_from: ["data:ro"]
  data:
    image: busybox
"#;
    let registry = EnvironmentRegistry::default();
    let first = registry.create(compose(content), overlay("dev-machine")).unwrap();
    let second = registry.create(compose(content), overlay("dev-machine")).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.start_order().names(), ["data", "dev-machine"]);
}

#[test]
fn test_overlay_errors_come_before_ordering() {
    let recipe = compose("services:\n  a: {image: busybox, depends_on: [a]}\n");
    let err = EnvironmentRegistry::default()
        .create(recipe, Machines::new())
        .unwrap_err();
    assert_eq!(err.message(), "Environment should contain at least 1 machine");
}

#[test]
fn test_self_dependency_is_rejected_by_validator() {
    let recipe = compose("services:\n  a: {image: busybox, depends_on: [a]}\n");
    let err = EnvironmentRegistry::default()
        .create(recipe, overlay("a"))
        .unwrap_err();
    assert_eq!(err.message(), "Container 'a' has illegal dependency to itself");
}

#[test]
fn test_dockerimage_uses_first_machine() {
    let mut machines = overlay("dev-machine");
    machines.insert("unused".to_string(), MachineConfig::default());

    let env = EnvironmentRegistry::default()
        .create(Recipe::new("dockerimage", None, "eclipse/ubuntu_jdk8"), machines)
        .unwrap();

    assert_eq!(env.start_order().names(), ["dev-machine"]);
    assert_eq!(
        env.model().containers["dev-machine"].image.as_deref(),
        Some("eclipse/ubuntu_jdk8")
    );
    assert_eq!(env.warnings()[0].code, EXTRA_MACHINES_IGNORED);
}

#[test]
fn test_dockerfile_environment() {
    let env = EnvironmentRegistry::default()
        .create(
            Recipe::new("dockerfile", Some("text/x-dockerfile"), "FROM busybox\n"),
            overlay("dev-machine"),
        )
        .unwrap();
    let build = env.model().containers["dev-machine"].build.clone().unwrap();
    assert_eq!(build.dockerfile.as_deref(), Some("FROM busybox\n"));
}

#[test]
fn test_openshift_environment() {
    let recipe = Recipe::new(
        "openshift",
        Some("application/x-yaml"),
        r#"
kind: List
items:
  - kind: Pod
    metadata:
      name: workspace
    spec:
      containers:
        - name: dev
          image: eclipse/ubuntu_jdk8
        - name: db
          image: mysql
  - kind: Service
    metadata: {name: agent}
    spec:
      selector: {app: workspace}
      ports: [{port: 4401}]
"#,
    );

    let env = EnvironmentRegistry::default()
        .create(recipe, overlay("workspace/dev"))
        .unwrap();

    assert_eq!(env.start_order().names(), ["workspace/dev", "workspace/db"]);
    assert_eq!(env.model().shared.services[0].name, "agent");
    assert_eq!(
        env.model().containers["workspace/dev"].labels["workspace.server.wsagent/http.port"],
        "4401/tcp"
    );
}

#[test]
fn test_unknown_and_disabled_recipe_types() {
    let err = EnvironmentRegistry::default()
        .create(Recipe::new("kubernetes", None, ""), overlay("dev"))
        .unwrap_err();
    assert_eq!(
        err.message(),
        "Environment recipe type 'kubernetes' is unsupported. Supported types are: compose, dockerfile, dockerimage, openshift"
    );

    let mut config = RuntimeConfig::default();
    config.recipes.enabled = vec!["compose".to_string()];
    let registry = EnvironmentRegistry::from_config(&config);
    assert!(registry.supports("compose"));
    assert!(!registry.supports("dockerimage"));
}
