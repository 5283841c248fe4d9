//! Lifecycle of one runtime: prepare, start, stop.
//!
//! A start attempt runs on one coordinating task:
//!
//! 1. shared resources, then containers in start order, one at a time;
//! 2. `STARTING` for every machine in start order;
//! 3. bootstrap and readiness of all machines concurrently, `RUNNING` as each
//!    one completes;
//! 4. on the first failure `FAILED` for that machine, the other units are
//!    dropped and everything created so far is cleaned up.
//!
//! The adapter's `watch` runs alongside steps 1 to 3 and fails the attempt
//! the same way.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error, info, info_span, warn, Instrument};
use wsrt_core::{InfrastructureError, MachineStatus, RuntimeIdentity, RuntimeStatus};
use wsrt_environment::{start_order, EnvironmentRegistry, InternalEnvironment, StartOrder};

use crate::adapter::InfrastructureAdapter;
use crate::error::{Result, RuntimeError};
use crate::events::EventService;
use crate::guard::guarded;
use crate::locks::CleanupLocks;

/// Entry point: holds the format registry, the adapter and the event channel.
pub struct RuntimeController {
    registry: Arc<EnvironmentRegistry>,
    adapter: Arc<dyn InfrastructureAdapter>,
    events: EventService,
    cleanup_locks: Arc<CleanupLocks>,
}

impl RuntimeController {
    pub fn new(registry: Arc<EnvironmentRegistry>, adapter: Arc<dyn InfrastructureAdapter>) -> Self {
        Self::with_events(registry, adapter, EventService::default())
    }

    pub fn with_events(
        registry: Arc<EnvironmentRegistry>,
        adapter: Arc<dyn InfrastructureAdapter>,
        events: EventService,
    ) -> Self {
        Self {
            registry,
            adapter,
            events,
            cleanup_locks: Arc::new(CleanupLocks::default()),
        }
    }

    pub fn events(&self) -> &EventService {
        &self.events
    }

    pub fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    /// Checks that `env` can be started and returns a context ready to start it.
    ///
    /// Nothing is created on the platform; failures here leave no resources.
    pub fn prepare(
        &self,
        identity: RuntimeIdentity,
        env: Arc<InternalEnvironment>,
    ) -> Result<RuntimeContext> {
        self.registry.require(env.recipe_type())?;
        let order = start_order::resolve(&env.model().containers)?;

        debug!(
            workspace_id = %identity.workspace_id,
            adapter = self.adapter.name(),
            "Runtime prepared"
        );

        Ok(RuntimeContext {
            identity,
            environment: env,
            order,
            adapter: Arc::clone(&self.adapter),
            events: self.events.clone(),
            cleanup_locks: Arc::clone(&self.cleanup_locks),
            state: Mutex::new(State::default()),
        })
    }
}

#[derive(Debug, Default)]
struct State {
    status: RuntimeStatus,
    running: Vec<String>,
}

/// One runtime instance and its attempt state.
pub struct RuntimeContext {
    identity: RuntimeIdentity,
    environment: Arc<InternalEnvironment>,
    order: StartOrder,
    adapter: Arc<dyn InfrastructureAdapter>,
    events: EventService,
    cleanup_locks: Arc<CleanupLocks>,
    state: Mutex<State>,
}

impl RuntimeContext {
    pub fn identity(&self) -> &RuntimeIdentity {
        &self.identity
    }

    pub fn environment(&self) -> &InternalEnvironment {
        &self.environment
    }

    pub fn start_order(&self) -> &StartOrder {
        &self.order
    }

    pub fn status(&self) -> RuntimeStatus {
        self.state().status
    }

    /// Machines that reached `RUNNING` in this attempt, in the order they did.
    pub fn running_machines(&self) -> Vec<String> {
        self.state().running.clone()
    }

    /// Starts every machine; on failure everything created is rolled back
    /// before the error is returned.
    pub async fn start(&self) -> Result<()> {
        self.transition(RuntimeStatus::Starting, "start")?;

        let span = info_span!("start", workspace_id = %self.identity.workspace_id);
        async {
            info!(machines = self.order.len(), "Starting runtime");
            match self.provision_watched().await {
                Ok(()) => {
                    self.set_status(RuntimeStatus::Running);
                    info!("Runtime is running");
                    Ok(())
                }
                Err(failure) => {
                    self.set_status(RuntimeStatus::Failed);
                    if failure.is_internal() {
                        error!(error = %failure, "Runtime start failed unexpectedly");
                    } else {
                        warn!(error = %failure, "Runtime start failed");
                    }
                    Err(self.rollback(failure).await.into())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Tears the runtime down. A failed cleanup is reported and not retried.
    pub async fn stop(&self) -> Result<()> {
        let status = self.status();
        if !status.can_transition_to(RuntimeStatus::Stopped) {
            return Err(self.invalid_state(status, "stop"));
        }

        let span = info_span!("stop", workspace_id = %self.identity.workspace_id);
        async {
            info!("Stopping runtime");
            self.cleanup().await?;

            let running = std::mem::take(&mut self.state().running);
            for name in self.order.iter().rev() {
                if running.iter().any(|r| r == name) {
                    self.events
                        .publish(&self.identity, name, MachineStatus::Stopped, None);
                }
            }
            self.set_status(RuntimeStatus::Stopped);
            info!("Runtime stopped");
            Ok::<(), RuntimeError>(())
        }
        .instrument(span)
        .await
    }

    async fn provision_watched(&self) -> std::result::Result<(), InfrastructureError> {
        let provisioning = self.provision();
        let watch = guarded("watch", self.adapter.watch(&self.identity));
        tokio::pin!(provisioning, watch);

        let mut watching = true;
        loop {
            tokio::select! {
                biased;
                result = &mut provisioning => return result,
                outcome = &mut watch, if watching => match outcome {
                    Ok(()) => {
                        debug!("Adapter stopped watching the runtime");
                        watching = false;
                    }
                    Err(failure) => {
                        warn!(error = %failure, "Runtime failure reported while starting");
                        return Err(failure);
                    }
                },
            }
        }
    }

    async fn provision(&self) -> std::result::Result<(), InfrastructureError> {
        guarded(
            "create_shared_resources",
            self.adapter
                .create_shared_resources(&self.identity, &self.environment),
        )
        .await?;

        let containers = &self.environment.model().containers;
        for name in self.order.iter() {
            let config = containers.get(name).ok_or_else(|| {
                InfrastructureError::internal(format!("Machine '{name}' is missing from the runtime model"))
            })?;
            debug!(machine = name, "Creating container");
            guarded(
                "create_container",
                self.adapter.create_container(&self.identity, name, config),
            )
            .await?;
        }

        for name in self.order.iter() {
            self.events
                .publish(&self.identity, name, MachineStatus::Starting, None);
        }

        let mut units: FuturesUnordered<_> =
            self.order.iter().map(|name| self.start_machine(name)).collect();

        // Returning drops the remaining units, which cancels them.
        while let Some((name, outcome)) = units.next().await {
            match outcome {
                Ok(()) => {
                    self.state().running.push(name.to_string());
                    self.events
                        .publish(&self.identity, name, MachineStatus::Running, None);
                }
                Err(failure) => {
                    self.events.publish(
                        &self.identity,
                        name,
                        MachineStatus::Failed,
                        Some(failure.to_string()),
                    );
                    return Err(failure);
                }
            }
        }

        Ok(())
    }

    async fn start_machine<'a>(
        &'a self,
        name: &'a str,
    ) -> (&'a str, std::result::Result<(), InfrastructureError>) {
        let installers = self.environment.installers(name);
        let outcome = async {
            guarded(
                "bootstrap",
                self.adapter.bootstrap(&self.identity, name, installers),
            )
            .await?;
            guarded("check_ready", self.adapter.check_ready(&self.identity, name)).await
        }
        .await;
        (name, outcome)
    }

    async fn rollback(&self, failure: InfrastructureError) -> InfrastructureError {
        match self.cleanup().await {
            Ok(()) => failure,
            Err(rollback) => {
                error!(error = %rollback, "Rollback of failed start did not complete");
                failure.with_rollback_failure(rollback)
            }
        }
    }

    async fn cleanup(&self) -> std::result::Result<(), InfrastructureError> {
        let _exclusive = self.cleanup_locks.acquire(&self.identity).await;
        guarded("cleanup", self.adapter.cleanup(&self.identity)).await
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: RuntimeStatus) {
        self.state().status = status;
    }

    fn transition(&self, next: RuntimeStatus, operation: &'static str) -> Result<()> {
        let mut state = self.state();
        if !state.status.can_transition_to(next) {
            return Err(self.invalid_state(state.status, operation));
        }
        state.status = next;
        Ok(())
    }

    fn invalid_state(&self, status: RuntimeStatus, operation: &'static str) -> RuntimeError {
        RuntimeError::InvalidState {
            identity: self.identity.clone(),
            status,
            operation,
        }
    }
}
