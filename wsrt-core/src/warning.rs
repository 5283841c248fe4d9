use serde::{Deserialize, Serialize};
use std::fmt;

/// Compose key the engine does not understand; it is ignored.
pub const UNKNOWN_COMPOSE_FIELD: u32 = 4100;

/// Single-machine recipe received more than one overlay machine.
pub const EXTRA_MACHINES_IGNORED: u32 = 4101;

/// Non-fatal remark collected while building an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub code: u32,
    pub message: String,
}

impl Warning {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
