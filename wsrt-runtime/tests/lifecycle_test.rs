//! Lifecycle scenarios driven through the mock adapter.

use std::sync::Arc;

use tokio::sync::broadcast::Receiver;
use wsrt_core::machine::WS_AGENT_INSTALLER;
use wsrt_core::{MachineConfig, MachineStatus, Recipe, RuntimeIdentity, RuntimeStatus};
use wsrt_environment::{EnvironmentRegistry, InternalEnvironment, Machines};
use wsrt_runtime::mock::{AdapterCall, Behavior, MockAdapter};
use wsrt_runtime::{MachineStatusEvent, RuntimeController, RuntimeError};

const TWO_MACHINES: &str = r#"
services:
  m1:
    image: eclipse/ubuntu_jdk8
  m2:
    image: busybox
"#;

fn environment(registry: &EnvironmentRegistry, content: &str) -> Arc<InternalEnvironment> {
    let mut machines = Machines::new();
    machines.insert(
        "m1".to_string(),
        MachineConfig::default()
            .with_installer(WS_AGENT_INSTALLER)
            .with_installer("org.eclipse.che.terminal"),
    );
    let recipe = Recipe::new("compose", Some("application/x-yaml"), content);
    Arc::new(registry.create(recipe, machines).expect("valid environment"))
}

struct Harness {
    adapter: Arc<MockAdapter>,
    controller: RuntimeController,
    env: Arc<InternalEnvironment>,
}

fn harness(adapter: MockAdapter, content: &str) -> Harness {
    let registry = Arc::new(EnvironmentRegistry::default());
    let env = environment(&registry, content);
    let adapter = Arc::new(adapter);
    let controller = RuntimeController::new(registry, adapter.clone());
    Harness {
        adapter,
        controller,
        env,
    }
}

fn identity() -> RuntimeIdentity {
    RuntimeIdentity::new("workspace123", "default", "alice")
}

fn drain(receiver: &mut Receiver<MachineStatusEvent>) -> Vec<(String, MachineStatus)> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push((event.machine_name, event.event_type));
    }
    events
}

fn event(machine: &str, status: MachineStatus) -> (String, MachineStatus) {
    (machine.to_string(), status)
}

#[tokio::test]
async fn test_starting_events_precede_running_events() {
    let h = harness(MockAdapter::new(), TWO_MACHINES);
    let mut events = h.controller.events().subscribe();
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();

    runtime.start().await.expect("runtime should start");

    assert_eq!(
        drain(&mut events),
        vec![
            event("m1", MachineStatus::Starting),
            event("m2", MachineStatus::Starting),
            event("m1", MachineStatus::Running),
            event("m2", MachineStatus::Running),
        ]
    );
    assert_eq!(runtime.status(), RuntimeStatus::Running);
    assert_eq!(h.adapter.cleanup_count(), 0);
}

#[tokio::test]
async fn test_adapter_call_order() {
    let h = harness(MockAdapter::new(), TWO_MACHINES);
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();
    runtime.start().await.unwrap();

    let calls: Vec<AdapterCall> = h
        .adapter
        .calls()
        .into_iter()
        .filter(|call| *call != AdapterCall::Watch)
        .collect();
    assert_eq!(
        calls,
        vec![
            AdapterCall::CreateSharedResources,
            AdapterCall::CreateContainer("m1".into()),
            AdapterCall::CreateContainer("m2".into()),
            AdapterCall::Bootstrap(
                "m1".into(),
                vec![WS_AGENT_INSTALLER.into(), "org.eclipse.che.terminal".into()]
            ),
            AdapterCall::CheckReady("m1".into()),
            AdapterCall::Bootstrap("m2".into(), vec![]),
            AdapterCall::CheckReady("m2".into()),
        ]
    );
}

#[tokio::test]
async fn test_containers_are_created_in_start_order() {
    let content = r#"
services:
  m1:
    image: eclipse/ubuntu_jdk8
    links: [db]
  db:
    image: mysql
    volumes_from: ["data:ro"]
  data:
    image: busybox
"#;
    let h = harness(MockAdapter::new(), content);
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();
    runtime.start().await.unwrap();

    let created: Vec<AdapterCall> = h
        .adapter
        .calls()
        .into_iter()
        .filter(|call| matches!(call, AdapterCall::CreateContainer(_)))
        .collect();
    assert_eq!(
        created,
        vec![
            AdapterCall::CreateContainer("data".into()),
            AdapterCall::CreateContainer("db".into()),
            AdapterCall::CreateContainer("m1".into()),
        ]
    );
}

#[tokio::test]
async fn test_bootstrap_failure_fails_fast_and_rolls_back() {
    let adapter = MockAdapter::new().on_bootstrap("m1", Behavior::Fail("installer exited with 1".into()));
    let h = harness(adapter, TWO_MACHINES);
    let mut events = h.controller.events().subscribe();
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();

    let err = runtime.start().await.unwrap_err();

    assert!(matches!(err, RuntimeError::Infrastructure(_)));
    assert!(err.to_string().contains("installer exited with 1"));
    assert_eq!(
        drain(&mut events),
        vec![
            event("m1", MachineStatus::Starting),
            event("m2", MachineStatus::Starting),
            event("m1", MachineStatus::Failed),
        ]
    );
    assert_eq!(h.adapter.cleanup_count(), 1);
    assert_eq!(runtime.status(), RuntimeStatus::Failed);
}

#[tokio::test]
async fn test_failure_cancels_units_still_in_flight() {
    let adapter = MockAdapter::new()
        .on_bootstrap("m1", Behavior::Hang)
        .on_check_ready("m2", Behavior::Fail("port 8080 never opened".into()));
    let h = harness(adapter, TWO_MACHINES);
    let mut events = h.controller.events().subscribe();
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();

    runtime.start().await.unwrap_err();

    let events = drain(&mut events);
    assert_eq!(events.last(), Some(&event("m2", MachineStatus::Failed)));
    assert!(!events.iter().any(|(_, status)| *status == MachineStatus::Running));
    assert_eq!(h.adapter.count(|c| matches!(c, AdapterCall::CheckReady(m) if m == "m1")), 0);
    assert_eq!(h.adapter.cleanup_count(), 1);
}

#[tokio::test]
async fn test_container_creation_failure_rolls_back_before_events() {
    let adapter = MockAdapter::new().on_create_container("m2", Behavior::Fail("no such image".into()));
    let h = harness(adapter, TWO_MACHINES);
    let mut events = h.controller.events().subscribe();
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();

    runtime.start().await.unwrap_err();

    assert!(drain(&mut events).is_empty());
    assert_eq!(h.adapter.cleanup_count(), 1);
    assert_eq!(h.adapter.count(|c| matches!(c, AdapterCall::Bootstrap(..))), 0);
}

#[tokio::test]
async fn test_rollback_failure_is_attached() {
    let adapter = MockAdapter::new()
        .on_shared_resources(Behavior::Fail("network create failed".into()))
        .on_cleanup(Behavior::Fail("network rm failed".into()));
    let h = harness(adapter, TWO_MACHINES);
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();

    let err = runtime.start().await.unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("network create failed"), "{message}");
    assert!(message.contains("network rm failed"), "{message}");
    assert!(!err.is_internal());
}

#[tokio::test]
async fn test_adapter_panic_is_internal_and_rolled_back() {
    let adapter = MockAdapter::new().on_check_ready("m2", Behavior::Panic("probe bug".into()));
    let h = harness(adapter, TWO_MACHINES);
    let mut events = h.controller.events().subscribe();
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();

    let err = runtime.start().await.unwrap_err();

    assert!(err.is_internal());
    assert!(err.to_string().contains("probe bug"));
    assert_eq!(drain(&mut events).last(), Some(&event("m2", MachineStatus::Failed)));
    assert_eq!(h.adapter.cleanup_count(), 1);
}

#[tokio::test]
async fn test_watch_failure_triggers_rollback() {
    let adapter = MockAdapter::new()
        .on_bootstrap("m1", Behavior::Hang)
        .on_watch(Behavior::Fail("container m2 exited".into()));
    let h = harness(adapter, TWO_MACHINES);
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();

    let err = runtime.start().await.unwrap_err();

    assert!(err.to_string().contains("container m2 exited"));
    assert_eq!(h.adapter.cleanup_count(), 1);
    assert_eq!(runtime.status(), RuntimeStatus::Failed);
}

#[tokio::test]
async fn test_watch_that_ends_quietly_does_not_fail_start() {
    let adapter = MockAdapter::new()
        .on_bootstrap("m1", Behavior::Succeed)
        .on_watch(Behavior::Succeed);
    let h = harness(adapter, TWO_MACHINES);
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();

    runtime.start().await.unwrap();
    assert_eq!(runtime.status(), RuntimeStatus::Running);
}

#[tokio::test]
async fn test_stop_reports_running_machines_in_reverse() {
    let h = harness(MockAdapter::new(), TWO_MACHINES);
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();
    runtime.start().await.unwrap();

    let mut events = h.controller.events().subscribe();
    runtime.stop().await.unwrap();

    assert_eq!(
        drain(&mut events),
        vec![
            event("m2", MachineStatus::Stopped),
            event("m1", MachineStatus::Stopped),
        ]
    );
    assert_eq!(runtime.status(), RuntimeStatus::Stopped);
    assert_eq!(h.adapter.cleanup_count(), 1);
}

#[tokio::test]
async fn test_stop_failure_is_reported_not_retried() {
    let adapter = MockAdapter::new().on_cleanup(Behavior::Fail("rm failed".into()));
    let h = harness(adapter, TWO_MACHINES);
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();
    runtime.start().await.unwrap();

    let err = runtime.stop().await.unwrap_err();
    assert!(err.to_string().contains("rm failed"));
    assert_eq!(h.adapter.cleanup_count(), 1);
    assert_eq!(runtime.status(), RuntimeStatus::Running);
}

#[tokio::test]
async fn test_illegal_transitions() {
    let h = harness(MockAdapter::new(), TWO_MACHINES);
    let runtime = h.controller.prepare(identity(), h.env.clone()).unwrap();

    let err = runtime.stop().await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::InvalidState {
            status: RuntimeStatus::New,
            ..
        }
    ));

    runtime.start().await.unwrap();
    let err = runtime.start().await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::InvalidState {
            status: RuntimeStatus::Running,
            operation: "start",
            ..
        }
    ));
    assert_eq!(h.adapter.count(|c| *c == AdapterCall::CreateSharedResources), 1);
}

#[tokio::test]
async fn test_prepare_rejects_unregistered_recipe_type() {
    let full = EnvironmentRegistry::default();
    let env = environment(&full, TWO_MACHINES);

    let mut config = wsrt_config::RuntimeConfig::default();
    config.recipes.enabled = vec!["dockerimage".into()];
    let adapter = Arc::new(MockAdapter::new());
    let controller =
        RuntimeController::new(Arc::new(EnvironmentRegistry::from_config(&config)), adapter.clone());

    let err = controller.prepare(identity(), env).err().unwrap();
    assert!(err.is_validation());
    assert!(adapter.calls().is_empty());
}
