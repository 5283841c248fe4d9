// Command handlers

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use wsrt_config::{ConfigLoader, RuntimeConfig};
use wsrt_core::recipe::{DOCKERFILE_CONTENT_TYPE, YAML_CONTENT_TYPES};
use wsrt_core::Recipe;
use wsrt_environment::recipe::{compose, dockerfile, dockerimage, openshift};
use wsrt_environment::{EnvironmentRegistry, InternalEnvironment, Machines};

use crate::cli::{Args, Command, RecipeArgs};

pub mod cleanup;
pub mod inspect;
pub mod start;

/// Main command dispatcher
#[must_use = "command execution results should be handled"]
pub async fn execute_command(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    match args.command {
        Command::Validate { recipe } => {
            debug!("Handling validate command");
            inspect::handle_validate(&config, &recipe)
        }
        Command::Order { recipe } => {
            debug!("Handling order command");
            inspect::handle_order(&config, &recipe)
        }
        Command::Show { recipe } => {
            debug!("Handling show command");
            inspect::handle_show(&config, &recipe)
        }
        Command::Types => {
            inspect::handle_types(&config);
            Ok(())
        }
        Command::Start {
            recipe,
            workspace_id,
            env_name,
            owner,
            json,
        } => {
            debug!("Handling start command");
            start::handle_start(config, &recipe, workspace_id, env_name, owner, json).await
        }
        Command::Cleanup {
            workspace_id,
            env_name,
        } => {
            debug!("Handling cleanup command");
            cleanup::handle_cleanup(&config, workspace_id, env_name).await
        }
    }
}

fn load_config(args: &Args) -> Result<RuntimeConfig> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    loader.load()
}

/// Content type used when the caller did not give one.
fn default_content_type(recipe_type: &str) -> Option<&'static str> {
    match recipe_type {
        compose::TYPE | openshift::TYPE => YAML_CONTENT_TYPES.first().copied(),
        dockerfile::TYPE => Some(DOCKERFILE_CONTENT_TYPE),
        _ => None,
    }
}

fn read_recipe(args: &RecipeArgs) -> Result<Recipe> {
    let content = fs::read_to_string(&args.recipe)
        .with_context(|| format!("Failed to read recipe {}", args.recipe.display()))?;
    let content = if args.recipe_type == dockerimage::TYPE {
        content.trim().to_string()
    } else {
        content
    };

    let content_type = args
        .content_type
        .as_deref()
        .or_else(|| default_content_type(&args.recipe_type));
    Ok(Recipe::new(&args.recipe_type, content_type, content))
}

fn read_machines(path: Option<&Path>) -> Result<Machines> {
    let Some(path) = path else {
        return Ok(Machines::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read machines file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Machines::default());
    }
    serde_yaml_ng::from_str(&content)
        .with_context(|| format!("Failed to parse machines file {}", path.display()))
}

/// Reads the recipe and its overlay and builds the environment.
pub(crate) fn load_environment(
    registry: &EnvironmentRegistry,
    args: &RecipeArgs,
) -> Result<InternalEnvironment> {
    let recipe = read_recipe(args)?;
    let machines = read_machines(args.machines.as_deref())?;
    registry
        .create(recipe, machines)
        .context("Environment is not valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn recipe_args(dir: &TempDir, file: &str, content: &str, recipe_type: &str) -> RecipeArgs {
        let path = dir.path().join(file);
        fs::write(&path, content).unwrap();
        RecipeArgs {
            recipe: path,
            recipe_type: recipe_type.to_string(),
            content_type: None,
            machines: None,
        }
    }

    #[test]
    fn test_content_type_guessed_from_type() {
        assert_eq!(default_content_type("compose"), Some("application/x-yaml"));
        assert_eq!(default_content_type("dockerfile"), Some("text/x-dockerfile"));
        assert_eq!(default_content_type("dockerimage"), None);
    }

    #[test]
    fn test_dockerimage_reference_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let args = recipe_args(&dir, "image", "eclipse/ubuntu_jdk8\n", "dockerimage");
        let recipe = read_recipe(&args).unwrap();
        assert_eq!(recipe.content, "eclipse/ubuntu_jdk8");
        assert_eq!(recipe.content_type(), None);
    }

    #[test]
    fn test_missing_machines_file_is_an_error() {
        let missing = PathBuf::from("/nonexistent/machines.yaml");
        assert!(read_machines(Some(&missing)).is_err());
        assert!(read_machines(None).unwrap().is_empty());
    }

    #[test]
    fn test_load_environment_with_overlay() {
        let dir = TempDir::new().unwrap();
        let mut args = recipe_args(
            &dir,
            "compose.yaml",
            "services:\n  db:\n    image: mysql\n  dev:\n    image: ubuntu\n    depends_on: [db]\n",
            "compose",
        );
        let machines = dir.path().join("machines.yaml");
        fs::write(
            &machines,
            "dev:\n  servers:\n    wsagent/http:\n      port: 4401\n      protocol: http\n",
        )
        .unwrap();
        args.machines = Some(machines);

        let registry = EnvironmentRegistry::from_config(&RuntimeConfig::default());
        let env = load_environment(&registry, &args).unwrap();
        assert_eq!(env.start_order().names(), ["db", "dev"]);
        assert!(env.model().containers["dev"].expose.contains(&"4401/tcp".to_string()));
    }
}
