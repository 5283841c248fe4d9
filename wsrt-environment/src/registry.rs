//! Recipe formats and the registry that selects one per recipe type.

use indexmap::IndexMap;
use tracing::{debug, warn};
use wsrt_config::RuntimeConfig;
use wsrt_core::{AgentCapability, MachineConfig, Recipe, ValidationError, Warning};

use crate::internal::InternalEnvironment;
use crate::model::RuntimeModel;
use crate::recipe::{compose, dockerfile, dockerimage, openshift};
use crate::validate::MachineValidator;
use crate::{normalize, start_order};

/// Machine overlay keyed by machine name, in declaration order.
pub type Machines = IndexMap<String, MachineConfig>;

/// Everything one recipe format knows how to do.
pub trait RecipeFormat: Send + Sync + 'static {
    /// Raw, unvalidated result of parsing.
    type Raw;

    fn recipe_type(&self) -> &'static str;

    fn parse(&self, recipe: &Recipe) -> Result<Self::Raw, ValidationError>;

    /// Format-specific checks; the overlay has already passed the common ones.
    fn validate(&self, raw: &Self::Raw, machines: &Machines) -> Result<(), ValidationError>;

    fn to_internal(
        &self,
        raw: Self::Raw,
        machines: &Machines,
        warnings: &mut Vec<Warning>,
    ) -> Result<RuntimeModel, ValidationError>;
}

// Object-safe view of a format so the registry can hold them side by side.
trait FormatHandler: Send + Sync {
    fn build(
        &self,
        recipe: &Recipe,
        machines: &Machines,
        common: &MachineValidator,
        warnings: &mut Vec<Warning>,
    ) -> Result<RuntimeModel, ValidationError>;
}

impl<F: RecipeFormat> FormatHandler for F {
    fn build(
        &self,
        recipe: &Recipe,
        machines: &Machines,
        common: &MachineValidator,
        warnings: &mut Vec<Warning>,
    ) -> Result<RuntimeModel, ValidationError> {
        let raw = self.parse(recipe)?;
        common.validate(machines)?;
        self.validate(&raw, machines)?;
        self.to_internal(raw, machines, warnings)
    }
}

/// Immutable map of recipe type to format, built once and shared.
pub struct EnvironmentRegistry {
    formats: IndexMap<&'static str, Box<dyn FormatHandler>>,
    common: MachineValidator,
}

impl std::fmt::Debug for EnvironmentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentRegistry")
            .field("formats", &self.formats.keys().collect::<Vec<_>>())
            .field("common", &self.common)
            .finish()
    }
}

impl Default for EnvironmentRegistry {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl EnvironmentRegistry {
    /// An empty registry; add formats with [`EnvironmentRegistry::with_format`].
    pub fn new(agent: AgentCapability) -> Self {
        Self {
            formats: IndexMap::new(),
            common: MachineValidator::new(agent),
        }
    }

    /// Registers the built-in formats enabled in `config`.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let mut registry = Self::new(config.agent.clone());
        let recipes = &config.recipes;

        if recipes.is_enabled(compose::TYPE) {
            registry = registry.with_format(compose::ComposeFormat);
        }
        if recipes.is_enabled(dockerfile::TYPE) {
            registry = registry.with_format(dockerfile::DockerfileFormat);
        }
        if recipes.is_enabled(dockerimage::TYPE) {
            registry = registry.with_format(dockerimage::DockerImageFormat);
        }
        if recipes.is_enabled(openshift::TYPE) {
            registry = registry.with_format(openshift::OpenShiftFormat);
        }
        for unknown in recipes
            .enabled
            .iter()
            .filter(|t| !registry.supports(t.as_str()))
        {
            warn!("Recipe type '{}' is enabled but has no implementation", unknown);
        }

        registry
    }

    pub fn with_format<F: RecipeFormat>(mut self, format: F) -> Self {
        self.formats.insert(format.recipe_type(), Box::new(format));
        self
    }

    pub fn supports(&self, recipe_type: &str) -> bool {
        self.formats.contains_key(recipe_type)
    }

    pub fn recipe_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.formats.keys().copied()
    }

    /// Fails unless a format is registered for `recipe_type`.
    pub fn require(&self, recipe_type: &str) -> Result<(), ValidationError> {
        if self.supports(recipe_type) {
            Ok(())
        } else {
            Err(self.unsupported(recipe_type))
        }
    }

    fn unsupported(&self, recipe_type: &str) -> ValidationError {
        ValidationError::new(format!(
            "Environment recipe type '{recipe_type}' is unsupported. Supported types are: {}",
            self.recipe_types().collect::<Vec<_>>().join(", ")
        ))
    }

    /// Parses, validates, orders and normalizes `recipe` with its overlay.
    ///
    /// Nothing outside the returned value is touched, so a failure here
    /// leaves no trace.
    pub fn create(
        &self,
        recipe: Recipe,
        machines: Machines,
    ) -> Result<InternalEnvironment, ValidationError> {
        let format = self
            .formats
            .get(recipe.recipe_type.as_str())
            .ok_or_else(|| self.unsupported(&recipe.recipe_type))?;

        let mut warnings = Vec::new();
        let mut model = format.build(&recipe, &machines, &self.common, &mut warnings)?;
        let order = start_order::resolve(&model.containers)?;
        normalize::apply(&mut model, &machines)?;

        for warning in &warnings {
            warn!(code = warning.code, "{}", warning.message);
        }
        debug!(
            recipe_type = %recipe.recipe_type,
            machines = model.containers.len(),
            order = ?order.names(),
            "Environment created"
        );

        Ok(InternalEnvironment::new(
            recipe, machines, warnings, model, order,
        ))
    }
}
