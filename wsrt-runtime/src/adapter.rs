//! The contract every platform adapter implements.

use async_trait::async_trait;
use wsrt_core::{InfrastructureError, RuntimeIdentity};
use wsrt_environment::{ContainerConfig, InternalEnvironment};

/// Creates, observes and destroys platform resources for one runtime.
///
/// Adapters own every platform handle and every timeout. The controller
/// calls them in a fixed order and treats a panic like an internal error.
#[async_trait]
pub trait InfrastructureAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Networks, services and routes shared by all machines.
    async fn create_shared_resources(
        &self,
        identity: &RuntimeIdentity,
        env: &InternalEnvironment,
    ) -> Result<(), InfrastructureError>;

    async fn create_container(
        &self,
        identity: &RuntimeIdentity,
        name: &str,
        config: &ContainerConfig,
    ) -> Result<(), InfrastructureError>;

    /// Resolves with an error when the platform reports a failure of the runtime.
    ///
    /// `Ok(())` means the adapter stopped watching without seeing one.
    async fn watch(&self, identity: &RuntimeIdentity) -> Result<(), InfrastructureError>;

    /// Removes every resource labelled with `identity`. Must tolerate partial state.
    async fn cleanup(&self, identity: &RuntimeIdentity) -> Result<(), InfrastructureError>;

    async fn bootstrap(
        &self,
        identity: &RuntimeIdentity,
        machine: &str,
        installers: &[String],
    ) -> Result<(), InfrastructureError>;

    async fn check_ready(
        &self,
        identity: &RuntimeIdentity,
        machine: &str,
    ) -> Result<(), InfrastructureError>;
}
