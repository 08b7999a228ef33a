//! Pulumi engine error types

use fibfactory_core::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulumiError {
    #[error("pulumi not found at '{0}'. Please install: https://www.pulumi.com/docs/install/")]
    PulumiNotFound(String),

    #[error("pulumi {command} failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("no stack named '{0}' found")]
    StackNotFound(String),

    #[error("another update is in progress on stack '{0}'")]
    UpdateConflict(String),

    #[error("Unexpected pulumi output: {0}")]
    InvalidOutput(String),

    #[error("Invalid program: {0}")]
    InvalidProgram(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PulumiError>;

impl From<PulumiError> for EngineError {
    fn from(err: PulumiError) -> Self {
        match err {
            PulumiError::StackNotFound(name) => EngineError::StackNotFound(name),
            PulumiError::PulumiNotFound(_) => EngineError::Unavailable(err.to_string()),
            PulumiError::InvalidOutput(_) | PulumiError::JsonError(_) => {
                EngineError::InvalidResponse(err.to_string())
            }
            PulumiError::IoError(e) => EngineError::Io(e),
            other => EngineError::CommandFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_not_found_maps_to_engine_not_found() {
        let err: EngineError = PulumiError::StackNotFound("fibfactory-x".to_string()).into();
        assert!(matches!(err, EngineError::StackNotFound(name) if name == "fibfactory-x"));
    }

    #[test]
    fn test_missing_binary_maps_to_unavailable() {
        let err: EngineError = PulumiError::PulumiNotFound("pulumi".to_string()).into();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[test]
    fn test_command_failure_keeps_message() {
        let err: EngineError = PulumiError::CommandFailed {
            command: "up".to_string(),
            message: "error: creating App Runner Service".to_string(),
        }
        .into();
        match err {
            EngineError::CommandFailed(message) => {
                assert!(message.contains("pulumi up failed"));
                assert!(message.contains("creating App Runner Service"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
