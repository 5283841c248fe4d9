//! Single-machine recipes whose content is a Dockerfile.

use wsrt_core::error::check_argument;
use wsrt_core::recipe::DOCKERFILE_CONTENT_TYPE;
use wsrt_core::{Recipe, ValidationError, Warning};

use crate::model::{BuildContext, ContainerConfig, RuntimeModel};
use crate::registry::{Machines, RecipeFormat};

pub const TYPE: &str = "dockerfile";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerfileRecipe {
    pub dockerfile: String,
}

pub struct DockerfileFormat;

impl RecipeFormat for DockerfileFormat {
    type Raw = DockerfileRecipe;

    fn recipe_type(&self) -> &'static str {
        TYPE
    }

    fn parse(&self, recipe: &Recipe) -> Result<DockerfileRecipe, ValidationError> {
        let content_type = recipe.content_type().unwrap_or_default();
        check_argument(content_type == DOCKERFILE_CONTENT_TYPE, || {
            format!(
                "Content type '{content_type}' of recipe of environment is unsupported. Supported values are: {DOCKERFILE_CONTENT_TYPE}"
            )
        })?;

        Ok(DockerfileRecipe {
            dockerfile: recipe.content.clone(),
        })
    }

    fn validate(&self, raw: &DockerfileRecipe, _machines: &Machines) -> Result<(), ValidationError> {
        check_argument(!raw.dockerfile.trim().is_empty(), || {
            "Dockerfile content should not be null.".to_string()
        })
    }

    fn to_internal(
        &self,
        raw: DockerfileRecipe,
        machines: &Machines,
        warnings: &mut Vec<Warning>,
    ) -> Result<RuntimeModel, ValidationError> {
        let machine = super::single_machine(TYPE, machines, warnings)?;
        let container = ContainerConfig {
            build: Some(BuildContext {
                dockerfile: Some(raw.dockerfile),
                ..Default::default()
            }),
            ..Default::default()
        };

        Ok(RuntimeModel {
            containers: [(machine, container)].into_iter().collect(),
            ..Default::default()
        })
    }
}
