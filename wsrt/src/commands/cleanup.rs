use anyhow::{Context, Result};
use tracing::info;
use wsrt_config::RuntimeConfig;
use wsrt_core::RuntimeIdentity;
use wsrt_provider::DockerAdapter;
use wsrt_runtime::InfrastructureAdapter;

/// Removes what a crashed or interrupted `start` left on Docker.
pub async fn handle_cleanup(
    config: &RuntimeConfig,
    workspace_id: String,
    env_name: String,
) -> Result<()> {
    let adapter = DockerAdapter::from_config(config);
    // Docker resources are found by workspace id and environment name.
    let identity = RuntimeIdentity::new(workspace_id, env_name, "wsrt");

    adapter
        .cleanup(&identity)
        .await
        .with_context(|| {
            format!(
                "Cleanup of workspace '{}' environment '{}' failed",
                identity.workspace_id, identity.env_name
            )
        })?;

    info!(workspace_id = %identity.workspace_id, env = %identity.env_name, "Runtime resources removed");
    println!(
        "Removed resources of workspace '{}' environment '{}'",
        identity.workspace_id, identity.env_name
    );
    Ok(())
}
