//! Foundation types shared by every wsrt crate.
//!
//! This crate holds the error taxonomy, the recipe and machine overlay model,
//! runtime identities and statuses, and the naming rules every layer checks
//! against. It performs no I/O.

pub mod error;
pub mod machine;
pub mod recipe;
pub mod runtime;
pub mod serde_ext;
pub mod validation;
pub mod warning;

pub use error::{InfrastructureError, ValidationError};
pub use machine::{AgentCapability, MachineConfig, ServerConfig};
pub use recipe::Recipe;
pub use runtime::{MachineStatus, RuntimeIdentity, RuntimeStatus};
pub use warning::Warning;
