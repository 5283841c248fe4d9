//! Commands that only read: nothing is created on any platform.

use anyhow::{Context, Result};
use wsrt_config::RuntimeConfig;
use wsrt_environment::EnvironmentRegistry;

use crate::cli::RecipeArgs;
use crate::commands::load_environment;

pub fn handle_validate(config: &RuntimeConfig, args: &RecipeArgs) -> Result<()> {
    let registry = EnvironmentRegistry::from_config(config);
    let env = load_environment(&registry, args)?;

    for warning in env.warnings() {
        println!("warning: {warning}");
    }
    println!(
        "Environment is valid: {} machine(s) of type '{}'",
        env.model().containers.len(),
        env.recipe_type()
    );
    Ok(())
}

pub fn handle_order(config: &RuntimeConfig, args: &RecipeArgs) -> Result<()> {
    let registry = EnvironmentRegistry::from_config(config);
    let env = load_environment(&registry, args)?;
    for name in env.start_order().iter() {
        println!("{name}");
    }
    Ok(())
}

pub fn handle_show(config: &RuntimeConfig, args: &RecipeArgs) -> Result<()> {
    let registry = EnvironmentRegistry::from_config(config);
    let env = load_environment(&registry, args)?;
    let yaml = serde_yaml_ng::to_string(env.model()).context("Failed to serialize runtime model")?;
    print!("{yaml}");
    Ok(())
}

pub fn handle_types(config: &RuntimeConfig) {
    let registry = EnvironmentRegistry::from_config(config);
    for recipe_type in registry.recipe_types() {
        println!("{recipe_type}");
    }
}
