//! Turns a recipe and its machine overlay into an [`InternalEnvironment`].
//!
//! ```text
//! Recipe ──parse──▶ raw model ──validate──▶ ──start_order──▶ ──normalize──▶ InternalEnvironment
//! ```
//!
//! Every step fails with a [`wsrt_core::ValidationError`] and none of them
//! touches the outside world.

pub mod internal;
pub mod model;
pub mod normalize;
pub mod recipe;
pub mod registry;
pub mod start_order;
pub mod validate;

pub use internal::InternalEnvironment;
pub use model::{BuildContext, ContainerConfig, RuntimeModel, SharedResources};
pub use registry::{EnvironmentRegistry, Machines, RecipeFormat};
pub use start_order::StartOrder;
