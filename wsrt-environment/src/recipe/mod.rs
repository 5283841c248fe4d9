//! Format-specific recipe parsers.
//!
//! Parsers only translate bytes into a raw model. They do not default,
//! resolve references or validate beyond what deserialization requires.

pub mod compose;
pub mod dockerfile;
pub mod dockerimage;
pub mod openshift;

use serde::de::DeserializeOwned;
use serde_yaml_ng as serde_yaml;
use wsrt_core::recipe::YAML_CONTENT_TYPES;
use wsrt_core::warning::EXTRA_MACHINES_IGNORED;
use wsrt_core::{Recipe, ValidationError, Warning};

use crate::registry::Machines;

/// Fails unless the recipe declares one of the YAML content types.
pub(crate) fn require_yaml_content_type(recipe: &Recipe) -> Result<(), ValidationError> {
    let content_type = recipe
        .content_type()
        .ok_or_else(|| ValidationError::new("Recipe content type should not be null"))?;

    if YAML_CONTENT_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "Provided environment recipe content type '{content_type}' is unsupported. Supported values are: {}",
            YAML_CONTENT_TYPES.join(", ")
        )))
    }
}

pub(crate) fn parse_yaml<T: DeserializeOwned>(content: &str) -> Result<T, ValidationError> {
    serde_yaml::from_str(content).map_err(|e| {
        ValidationError::new(format!("Parsing of environment configuration failed. {e}"))
    })
}

/// Picks the machine a single-container recipe runs as: the first one declared.
pub(crate) fn single_machine(
    recipe_type: &str,
    machines: &Machines,
    warnings: &mut Vec<Warning>,
) -> Result<String, ValidationError> {
    let mut names = machines.keys();
    let first = names
        .next()
        .ok_or_else(|| ValidationError::new("Environment should contain at least 1 machine"))?;

    let ignored: Vec<&str> = names.map(String::as_str).collect();
    if !ignored.is_empty() {
        warnings.push(Warning::new(
            EXTRA_MACHINES_IGNORED,
            format!(
                "Environment of type '{recipe_type}' runs a single machine '{first}'; machines {} are ignored",
                ignored.join(", ")
            ),
        ));
    }

    Ok(first.clone())
}
