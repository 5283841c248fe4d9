//! Single-machine recipes whose content is an image reference.
//!
//! The content type is not inspected.

use wsrt_core::error::check_argument;
use wsrt_core::{Recipe, ValidationError, Warning};

use crate::model::{ContainerConfig, RuntimeModel};
use crate::registry::{Machines, RecipeFormat};

pub const TYPE: &str = "dockerimage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImageRecipe {
    pub image: String,
}

pub struct DockerImageFormat;

impl RecipeFormat for DockerImageFormat {
    type Raw = DockerImageRecipe;

    fn recipe_type(&self) -> &'static str {
        TYPE
    }

    fn parse(&self, recipe: &Recipe) -> Result<DockerImageRecipe, ValidationError> {
        Ok(DockerImageRecipe {
            image: recipe.content.trim().to_string(),
        })
    }

    fn validate(&self, raw: &DockerImageRecipe, _machines: &Machines) -> Result<(), ValidationError> {
        check_argument(!raw.image.is_empty(), || {
            "Docker image reference should not be empty.".to_string()
        })
    }

    fn to_internal(
        &self,
        raw: DockerImageRecipe,
        machines: &Machines,
        warnings: &mut Vec<Warning>,
    ) -> Result<RuntimeModel, ValidationError> {
        let machine = super::single_machine(TYPE, machines, warnings)?;
        let container = ContainerConfig {
            image: Some(raw.image),
            ..Default::default()
        };

        Ok(RuntimeModel {
            containers: [(machine, container)].into_iter().collect(),
            ..Default::default()
        })
    }
}
