use wsrt_core::{MachineConfig, Recipe, Warning};

use crate::model::RuntimeModel;
use crate::registry::Machines;
use crate::start_order::StartOrder;

/// A validated, ordered and normalized environment, ready for a runtime.
///
/// Owns copies of the recipe and the machine overlay. Once handed to the
/// lifecycle controller it is shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalEnvironment {
    recipe: Recipe,
    machines: Machines,
    warnings: Vec<Warning>,
    model: RuntimeModel,
    start_order: StartOrder,
}

impl InternalEnvironment {
    pub fn new(
        recipe: Recipe,
        machines: Machines,
        warnings: Vec<Warning>,
        model: RuntimeModel,
        start_order: StartOrder,
    ) -> Self {
        Self {
            recipe,
            machines,
            warnings,
            model,
            start_order,
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn recipe_type(&self) -> &str {
        &self.recipe.recipe_type
    }

    pub fn machines(&self) -> &Machines {
        &self.machines
    }

    /// Overlay of `name`, if the user supplied one.
    pub fn machine(&self, name: &str) -> Option<&MachineConfig> {
        self.machines.get(name)
    }

    /// Installer ids configured for `name`; empty when the machine has no overlay.
    pub fn installers(&self, name: &str) -> &[String] {
        self.machine(name)
            .map(|machine| machine.installers.as_slice())
            .unwrap_or_default()
    }

    pub fn add_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn model(&self) -> &RuntimeModel {
        &self.model
    }

    pub fn start_order(&self) -> &StartOrder {
        &self.start_order
    }
}
