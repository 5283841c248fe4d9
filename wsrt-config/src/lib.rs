//! Engine configuration: which recipe formats are enabled, how the
//! workspace agent is recognised, how the Docker adapter behaves and which
//! scripts install which installer ids.

pub mod config;
pub mod loader;

pub use config::{DockerSettings, RecipeSettings, RuntimeConfig};
pub use loader::ConfigLoader;
