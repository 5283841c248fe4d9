//! Scriptable in-memory adapter for tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use wsrt_core::{InfrastructureError, RuntimeIdentity};
use wsrt_environment::{ContainerConfig, InternalEnvironment};

use crate::adapter::InfrastructureAdapter;

/// What a scripted operation does when called.
#[derive(Debug, Clone, Default)]
pub enum Behavior {
    #[default]
    Succeed,
    Fail(String),
    Panic(String),
    /// Never completes; only cancellation ends it.
    Hang,
}

impl Behavior {
    async fn run(self) -> Result<(), InfrastructureError> {
        match self {
            Self::Succeed => Ok(()),
            Self::Fail(message) => Err(InfrastructureError::platform(message)),
            Self::Panic(message) => panic!("{message}"),
            Self::Hang => std::future::pending().await,
        }
    }
}

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    CreateSharedResources,
    CreateContainer(String),
    Watch,
    Cleanup,
    Bootstrap(String, Vec<String>),
    CheckReady(String),
}

/// Records every call and replays scripted behaviors.
///
/// Everything succeeds immediately unless scripted otherwise; `watch` hangs
/// by default, as a healthy platform would.
#[derive(Debug)]
pub struct MockAdapter {
    calls: Mutex<Vec<AdapterCall>>,
    shared: Behavior,
    watch: Behavior,
    cleanup: Behavior,
    containers: HashMap<String, Behavior>,
    bootstrap: HashMap<String, Behavior>,
    ready: HashMap<String, Behavior>,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            shared: Behavior::Succeed,
            watch: Behavior::Hang,
            cleanup: Behavior::Succeed,
            containers: HashMap::new(),
            bootstrap: HashMap::new(),
            ready: HashMap::new(),
        }
    }
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_shared_resources(mut self, behavior: Behavior) -> Self {
        self.shared = behavior;
        self
    }

    pub fn on_watch(mut self, behavior: Behavior) -> Self {
        self.watch = behavior;
        self
    }

    pub fn on_cleanup(mut self, behavior: Behavior) -> Self {
        self.cleanup = behavior;
        self
    }

    pub fn on_create_container(mut self, machine: &str, behavior: Behavior) -> Self {
        self.containers.insert(machine.to_string(), behavior);
        self
    }

    pub fn on_bootstrap(mut self, machine: &str, behavior: Behavior) -> Self {
        self.bootstrap.insert(machine.to_string(), behavior);
        self
    }

    pub fn on_check_ready(mut self, machine: &str, behavior: Behavior) -> Self {
        self.ready.insert(machine.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, predicate: impl Fn(&AdapterCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub fn cleanup_count(&self) -> usize {
        self.count(|call| *call == AdapterCall::Cleanup)
    }

    fn record(&self, call: AdapterCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn scripted(scripts: &HashMap<String, Behavior>, machine: &str) -> Behavior {
        scripts.get(machine).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl InfrastructureAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_shared_resources(
        &self,
        _identity: &RuntimeIdentity,
        _env: &InternalEnvironment,
    ) -> Result<(), InfrastructureError> {
        self.record(AdapterCall::CreateSharedResources);
        self.shared.clone().run().await
    }

    async fn create_container(
        &self,
        _identity: &RuntimeIdentity,
        name: &str,
        _config: &ContainerConfig,
    ) -> Result<(), InfrastructureError> {
        self.record(AdapterCall::CreateContainer(name.to_string()));
        Self::scripted(&self.containers, name).run().await
    }

    async fn watch(&self, _identity: &RuntimeIdentity) -> Result<(), InfrastructureError> {
        self.record(AdapterCall::Watch);
        self.watch.clone().run().await
    }

    async fn cleanup(&self, _identity: &RuntimeIdentity) -> Result<(), InfrastructureError> {
        self.record(AdapterCall::Cleanup);
        self.cleanup.clone().run().await
    }

    async fn bootstrap(
        &self,
        _identity: &RuntimeIdentity,
        machine: &str,
        installers: &[String],
    ) -> Result<(), InfrastructureError> {
        self.record(AdapterCall::Bootstrap(machine.to_string(), installers.to_vec()));
        Self::scripted(&self.bootstrap, machine).run().await
    }

    async fn check_ready(
        &self,
        _identity: &RuntimeIdentity,
        machine: &str,
    ) -> Result<(), InfrastructureError> {
        self.record(AdapterCall::CheckReady(machine.to_string()));
        Self::scripted(&self.ready, machine).run().await
    }
}
