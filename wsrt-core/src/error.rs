use thiserror::Error;

/// Malformed or inconsistent user input.
///
/// Raised before any platform resource exists, so it never triggers a rollback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Fails with a [`ValidationError`] carrying `message` unless `expression` holds.
pub fn check_argument(expression: bool, message: impl FnOnce() -> String) -> Result<(), ValidationError> {
    if expression {
        Ok(())
    } else {
        Err(ValidationError::new(message()))
    }
}

/// Errors raised while talking to the platform that hosts a runtime.
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("{0}")]
    Platform(String),

    /// Anything the adapter did not anticipate, including panics.
    #[error("Internal infrastructure error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{original}. Cleanup of the runtime failed as well: {rollback}")]
    RollbackFailed {
        original: Box<InfrastructureError>,
        rollback: Box<InfrastructureError>,
    },
}

impl InfrastructureError {
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Attaches a failed rollback to this error without losing it.
    pub fn with_rollback_failure(self, rollback: InfrastructureError) -> Self {
        Self::RollbackFailed {
            original: Box::new(self),
            rollback: Box::new(rollback),
        }
    }

    /// Whether the root cause was unexpected rather than an ordinary platform failure.
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Internal(_) => true,
            Self::RollbackFailed { original, .. } => original.is_internal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_argument() {
        assert!(check_argument(true, || "unused".to_string()).is_ok());

        let err = check_argument(false, || "Environment should contain at least 1 machine".into())
            .unwrap_err();
        assert_eq!(err.message(), "Environment should contain at least 1 machine");
    }

    #[test]
    fn test_rollback_failure_keeps_original() {
        let err = InfrastructureError::platform("service creation failed")
            .with_rollback_failure(InfrastructureError::platform("network removal failed"));

        let message = err.to_string();
        assert!(message.starts_with("service creation failed"));
        assert!(message.contains("network removal failed"));
        assert!(!err.is_internal());
    }

    #[test]
    fn test_internal_survives_rollback_wrapping() {
        let err = InfrastructureError::internal("adapter panicked")
            .with_rollback_failure(InfrastructureError::platform("cleanup failed"));
        assert!(err.is_internal());
    }
}
