//! Automation engine abstraction
//!
//! The orchestrator never talks to a cloud directly. Everything it needs is
//! expressed through these two traits, implemented by the Pulumi adapter in
//! production and by [`crate::memory::InMemoryEngine`] in tests.

use crate::error::EngineResult;
use crate::naming::{ProjectName, StackName};
use crate::stack::{
    APP_NAME_KEY, CONTAINER_PORT_KEY, ConfigValue, DestroyResult, SERVICE_URL_OUTPUT,
    StackSummary, UpResult,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// The infrastructure program an engine runs for every environment stack
///
/// Reads [`APP_NAME_KEY`] and [`CONTAINER_PORT_KEY`] from stack configuration
/// and exports [`SERVICE_URL_OUTPUT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfrastructureProgram {
    work_dir: PathBuf,
}

impl InfrastructureProgram {
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }

    /// Directory the engine executes the program from
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn required_config(&self) -> [&'static str; 2] {
        [APP_NAME_KEY, CONTAINER_PORT_KEY]
    }

    pub fn service_url_output(&self) -> &'static str {
        SERVICE_URL_OUTPUT
    }
}

/// Infrastructure automation engine
///
/// Stack state lives in the engine's backend; implementations must not cache
/// it between calls.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    type Stack: StackHandle;

    /// Returns the engine name (e.g., "pulumi")
    fn name(&self) -> &str;

    /// Check that the engine can be driven at all (binary present, backend reachable)
    async fn check(&self) -> EngineResult<String>;

    /// Select the stack, creating its bookkeeping if it does not exist yet
    async fn select_or_create_stack(
        &self,
        name: &StackName,
        project: &ProjectName,
        program: &InfrastructureProgram,
    ) -> EngineResult<Self::Stack>;

    /// Select an existing stack; `EngineError::StackNotFound` when absent
    async fn select_stack(
        &self,
        name: &StackName,
        project: &ProjectName,
        program: &InfrastructureProgram,
    ) -> EngineResult<Self::Stack>;

    /// Every stack visible in the workspace, in engine order, across all projects
    async fn list_stacks(&self) -> EngineResult<Vec<StackSummary>>;

    /// Permanently delete the stack's bookkeeping
    async fn remove_stack(&self, name: &StackName) -> EngineResult<()>;
}

/// View of a single stack in the engine's backend
#[async_trait]
pub trait StackHandle: Send + Sync {
    fn name(&self) -> &StackName;

    /// Set one configuration value; re-applying the same value is a no-op
    async fn set_config(&self, key: &str, value: &ConfigValue) -> EngineResult<()>;

    /// Reconcile cloud resources with the program
    async fn up(&self) -> EngineResult<UpResult>;

    /// Tear down all resources, keeping the stack's history
    async fn destroy(&self) -> EngineResult<DestroyResult>;
}
