//! Runtime lifecycle controller.
//!
//! [`RuntimeController::prepare`] turns an [`wsrt_environment::InternalEnvironment`]
//! into a [`RuntimeContext`]; the context starts and stops the runtime through
//! an [`InfrastructureAdapter`] and publishes machine status events on the
//! controller's [`EventService`].

pub mod adapter;
pub mod controller;
pub mod error;
pub mod events;
mod guard;
pub mod locks;
#[cfg(feature = "test-helpers")]
pub mod mock;

pub use adapter::InfrastructureAdapter;
pub use controller::{RuntimeContext, RuntimeController};
pub use error::{Result, RuntimeError};
pub use events::{EventService, MachineStatusEvent};
