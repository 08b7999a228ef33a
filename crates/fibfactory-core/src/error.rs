//! Error types for engine adapters and lifecycle operations

use crate::naming::StackName;
use serde::Serialize;
use thiserror::Error;

/// Errors reported by an automation engine adapter
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine command failed: {0}")]
    CommandFailed(String),

    #[error("Unexpected engine response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// The engine interaction a lifecycle operation was performing when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SelectOrCreate,
    Select,
    SetConfig,
    Up,
    Destroy,
    Remove,
    List,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::SelectOrCreate => write!(f, "select-or-create"),
            Step::Select => write!(f, "select"),
            Step::SetConfig => write!(f, "set-config"),
            Step::Up => write!(f, "up"),
            Step::Destroy => write!(f, "destroy"),
            Step::Remove => write!(f, "remove"),
            Step::List => write!(f, "list"),
        }
    }
}

/// Classification of a failed lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    EngineFailure,
    OutputMissing,
    RemovalFailed,
}

impl ErrorKind {
    /// Whether the failure was caused by the caller rather than the engine or cloud
    pub fn is_user_error(self) -> bool {
        matches!(self, ErrorKind::InvalidInput | ErrorKind::NotFound)
    }
}

/// Failure of a create, list or destroy operation
///
/// None of these are retried inside the orchestrator. Each one names the
/// stack and the failing step so the operator can re-issue the same
/// operation.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Environment not found: stack {stack} does not exist")]
    NotFound { stack: StackName },

    #[error("Engine failure during {step} of stack {}", display_stack(.stack))]
    EngineFailure {
        step: Step,
        stack: Option<StackName>,
        #[source]
        source: EngineError,
    },

    #[error("Stack {stack} reported success without output '{output}'")]
    OutputMissing { stack: StackName, output: String },

    #[error("Stack {stack} was destroyed but could not be removed")]
    RemovalFailed {
        stack: StackName,
        #[source]
        source: EngineError,
    },
}

fn display_stack(stack: &Option<StackName>) -> &str {
    stack.as_ref().map(StackName::as_str).unwrap_or("<all>")
}

impl LifecycleError {
    pub(crate) fn engine(step: Step, stack: &StackName, source: EngineError) -> Self {
        LifecycleError::EngineFailure {
            step,
            stack: Some(stack.clone()),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::InvalidInput(_) => ErrorKind::InvalidInput,
            LifecycleError::NotFound { .. } => ErrorKind::NotFound,
            LifecycleError::EngineFailure { .. } => ErrorKind::EngineFailure,
            LifecycleError::OutputMissing { .. } => ErrorKind::OutputMissing,
            LifecycleError::RemovalFailed { .. } => ErrorKind::RemovalFailed,
        }
    }

    /// The engine step that failed, if the failure came from the engine
    pub fn step(&self) -> Option<Step> {
        match self {
            LifecycleError::EngineFailure { step, .. } => Some(*step),
            LifecycleError::OutputMissing { .. } => Some(Step::Up),
            LifecycleError::RemovalFailed { .. } => Some(Step::Remove),
            LifecycleError::NotFound { .. } => Some(Step::Select),
            LifecycleError::InvalidInput(_) => None,
        }
    }

    /// The stack the failed operation targeted
    pub fn stack(&self) -> Option<&StackName> {
        match self {
            LifecycleError::EngineFailure { stack, .. } => stack.as_ref(),
            LifecycleError::NotFound { stack }
            | LifecycleError::OutputMissing { stack, .. }
            | LifecycleError::RemovalFailed { stack, .. } => Some(stack),
            LifecycleError::InvalidInput(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{EnvironmentId, ProjectName};

    fn stack() -> StackName {
        let project = ProjectName::new("fibfactory").unwrap();
        let env = EnvironmentId::parse("test1").unwrap();
        StackName::derive(&project, &env)
    }

    #[test]
    fn test_engine_failure_reports_step_and_stack() {
        let err = LifecycleError::engine(
            Step::Up,
            &stack(),
            EngineError::CommandFailed("quota exceeded".to_string()),
        );

        assert_eq!(err.kind(), ErrorKind::EngineFailure);
        assert_eq!(err.step(), Some(Step::Up));
        assert_eq!(err.stack().map(StackName::as_str), Some("fibfactory-test1"));
        assert_eq!(
            err.to_string(),
            "Engine failure during up of stack fibfactory-test1"
        );

        // the engine message is only carried as the source
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Engine command failed: quota exceeded");
    }

    #[test]
    fn test_list_failure_has_no_stack() {
        let err = LifecycleError::EngineFailure {
            step: Step::List,
            stack: None,
            source: EngineError::Unavailable("pulumi".to_string()),
        };
        assert!(err.stack().is_none());
        assert!(err.to_string().contains("<all>"));
    }

    #[test]
    fn test_user_error_classification() {
        assert!(ErrorKind::InvalidInput.is_user_error());
        assert!(ErrorKind::NotFound.is_user_error());
        assert!(!ErrorKind::EngineFailure.is_user_error());
        assert!(!ErrorKind::OutputMissing.is_user_error());
        assert!(!ErrorKind::RemovalFailed.is_user_error());
    }
}
