use thiserror::Error;
use wsrt_core::{InfrastructureError, RuntimeIdentity, RuntimeStatus, ValidationError};

/// Errors surfaced by the lifecycle controller.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Rejected before any platform resource was created.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Failed while talking to the platform; the attempt has been rolled back.
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    #[error("Can not {operation} runtime '{identity}' in status {status}")]
    InvalidState {
        identity: RuntimeIdentity,
        status: RuntimeStatus,
        operation: &'static str,
    },
}

impl RuntimeError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Infrastructure(e) if e.is_internal())
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
