//! Docker implementation of [`wsrt_runtime::InfrastructureAdapter`].

pub mod command;
pub mod docker;

pub use command::DockerCommand;
pub use docker::DockerAdapter;
