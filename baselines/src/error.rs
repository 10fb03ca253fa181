//! Error type for agent construction, training and persistence.

use std::fmt;
use std::io;

use classic_control::EnvError;

use crate::checkpoint::CheckpointError;

pub type Result<T> = std::result::Result<T, BaselinesError>;

#[derive(Debug)]
pub enum BaselinesError {
    /// Policy id not present in the policy registry.
    UnknownPolicy {
        id: String,
        known: Vec<&'static str>,
    },
    /// Invalid hyperparameter or argument.
    InvalidConfig { param: String, message: String },
    /// Environment construction failed.
    Env(EnvError),
    /// Saving or loading an agent failed.
    Checkpoint(CheckpointError),
    /// IO error (log sinks, directories).
    Io(io::Error),
}

impl BaselinesError {
    pub(crate) fn invalid_config(param: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            param: param.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BaselinesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPolicy { id, known } => write!(
                f,
                "Unknown policy '{}' (available: {})",
                id,
                known.join(", ")
            ),
            Self::InvalidConfig { param, message } => {
                write!(f, "Invalid configuration for '{}': {}", param, message)
            }
            Self::Env(e) => write!(f, "Environment error: {}", e),
            Self::Checkpoint(e) => write!(f, "Checkpoint error: {}", e),
            Self::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for BaselinesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Env(e) => Some(e),
            Self::Checkpoint(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EnvError> for BaselinesError {
    fn from(e: EnvError) -> Self {
        Self::Env(e)
    }
}

impl From<CheckpointError> for BaselinesError {
    fn from(e: CheckpointError) -> Self {
        Self::Checkpoint(e)
    }
}

impl From<io::Error> for BaselinesError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
