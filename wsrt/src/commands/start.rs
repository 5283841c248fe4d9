use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use uuid::Uuid;
use wsrt_config::RuntimeConfig;
use wsrt_core::RuntimeIdentity;
use wsrt_environment::EnvironmentRegistry;
use wsrt_provider::DockerAdapter;
use wsrt_runtime::{MachineStatusEvent, RuntimeContext, RuntimeController};

use crate::cli::RecipeArgs;
use crate::commands::load_environment;

fn render(event: &MachineStatusEvent, json: bool) -> String {
    if json {
        return serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
    }
    let status = event.event_type.to_string();
    match &event.error {
        Some(error) => format!("{status:<10} {} ({error})", event.machine_name),
        None => format!("{status:<10} {}", event.machine_name),
    }
}

/// Starts the environment, then waits for Ctrl-C and stops it.
pub async fn handle_start(
    config: RuntimeConfig,
    args: &RecipeArgs,
    workspace_id: Option<String>,
    env_name: String,
    owner: String,
    json: bool,
) -> Result<()> {
    let registry = EnvironmentRegistry::from_config(&config);
    let env = load_environment(&registry, args)?;
    for warning in env.warnings() {
        warn!(code = warning.code, "{}", warning.message);
    }

    let adapter = Arc::new(DockerAdapter::from_config(&config));
    let controller = RuntimeController::new(Arc::new(registry), adapter);

    let workspace_id = workspace_id.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let identity = RuntimeIdentity::new(workspace_id, env_name, owner);
    let context = controller.prepare(identity, Arc::new(env))?;

    let printer = tokio::spawn(forward_events(
        controller.events().subscribe(),
        json,
        io::stdout(),
    ));

    let outcome = run_until_interrupted(&context).await;

    // Every sender gone closes the channel; the printer then drains what is left.
    drop(context);
    drop(controller);
    if let Err(e) = printer.await {
        warn!(error = %e, "Event output task failed");
    }
    outcome
}

async fn run_until_interrupted(context: &RuntimeContext) -> Result<()> {
    let identity = context.identity();
    let (workspace_id, env_name) = (&identity.workspace_id, &identity.env_name);

    context
        .start()
        .await
        .with_context(|| format!("Runtime of workspace '{workspace_id}' failed to start"))?;

    println!("Workspace '{workspace_id}' is running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!(workspace_id = %workspace_id, "Interrupted, stopping runtime");
    context.stop().await.with_context(|| {
        format!(
            "Runtime of workspace '{workspace_id}' failed to stop; run `wsrt cleanup {workspace_id} --env-name {env_name}`"
        )
    })
}

/// Writes every event to `out` until the channel closes, then hands `out` back.
async fn forward_events<W: Write>(
    mut events: broadcast::Receiver<MachineStatusEvent>,
    json: bool,
    mut out: W,
) -> W {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = writeln!(out, "{}", render(&event, json)) {
                    warn!(error = %e, "Failed to write machine event");
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event output fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
    out
}
