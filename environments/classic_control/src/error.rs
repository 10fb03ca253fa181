//! Error types for the classic-control environments.

use std::fmt;

/// Result type for environment operations.
pub type Result<T> = std::result::Result<T, EnvError>;

/// Error types that can occur when building or driving an environment.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvError {
    /// The id is not present in the registry.
    UnknownEnvironment {
        id: String,
        known: Vec<&'static str>,
    },
    /// Invalid configuration (num_envs = 0, ...)
    InvalidConfig {
        param: String,
        message: String,
    },
    /// Action count does not match the number of replicas.
    ActionCountMismatch {
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEnvironment { id, known } => write!(
                f,
                "Unknown environment id '{}' (registered: {})",
                id,
                known.join(", ")
            ),
            Self::InvalidConfig { param, message } => {
                write!(f, "Invalid configuration for '{}': {}", param, message)
            }
            Self::ActionCountMismatch { expected, actual } => {
                write!(f, "Action count mismatch: expected {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for EnvError {}
