//! Environment lifecycle orchestration
//!
//! ```text
//! ABSENT --create--> RUNNING --destroy--> DESTROYED_RETAINED --remove--> ABSENT
//! ```
//!
//! The state lives in the engine's backend. Every call re-derives the stack
//! name from the environment id and re-queries the engine; nothing is cached
//! here. A failed step is reported as-is and is never retried or rolled back.

use crate::engine::{AutomationEngine, InfrastructureProgram, StackHandle};
use crate::error::{EngineError, LifecycleError, Result, Step};
use crate::naming::{EnvironmentId, ProjectName, StackName};
use crate::outcome::{ListOutcome, Operation, OperationOutcome};
use crate::stack::{DEFAULT_CONTAINER_PORT, SERVICE_URL_OUTPUT, StackConfig};
use std::collections::BTreeMap;

/// Drives environment stacks through an [`AutomationEngine`]
pub struct Lifecycle<E: AutomationEngine> {
    engine: E,
    project: ProjectName,
    program: InfrastructureProgram,
    container_port: u16,
}

impl<E: AutomationEngine> Lifecycle<E> {
    pub fn new(engine: E, project: ProjectName, program: InfrastructureProgram) -> Self {
        Self {
            engine,
            project,
            program,
            container_port: DEFAULT_CONTAINER_PORT,
        }
    }

    pub fn with_container_port(mut self, port: u16) -> Self {
        self.container_port = port;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn project(&self) -> &ProjectName {
        &self.project
    }

    /// Create or update the environment and return its service URL
    pub async fn create(&self, environment_id: &str) -> Result<OperationOutcome> {
        let environment = EnvironmentId::parse(environment_id)?;
        let stack_name = StackName::derive(&self.project, &environment);
        let config = StackConfig::for_environment(&environment, self.container_port);

        let stack = self
            .engine
            .select_or_create_stack(&stack_name, &self.project, &self.program)
            .await
            .map_err(|e| LifecycleError::engine(Step::SelectOrCreate, &stack_name, e))?;
        tracing::info!("Successfully initialized stack {}", stack_name);

        for (key, value) in config.entries() {
            stack
                .set_config(key, &value)
                .await
                .map_err(|e| LifecycleError::engine(Step::SetConfig, &stack_name, e))?;
        }
        tracing::info!("Config set");

        tracing::info!("Deploying the stack...");
        let result = stack
            .up()
            .await
            .map_err(|e| LifecycleError::engine(Step::Up, &stack_name, e))?;

        let outcome = OperationOutcome {
            operation: Operation::Create,
            stack: stack_name.clone(),
            outputs: result.outputs,
            summary: result.summary,
        };

        let Some(service_url) = outcome.service_url() else {
            return Err(LifecycleError::OutputMissing {
                stack: stack_name,
                output: SERVICE_URL_OUTPUT.to_string(),
            });
        };

        tracing::info!("Stack {} created successfully", stack_name);
        tracing::info!("Service URL: {}", service_url);
        Ok(outcome)
    }

    /// Environments of this project, in the order the engine reports them
    pub async fn list(&self) -> Result<ListOutcome> {
        let stacks = self
            .engine
            .list_stacks()
            .await
            .map_err(|source| LifecycleError::EngineFailure {
                step: Step::List,
                stack: None,
                source,
            })?;

        let total = stacks.len();
        let owned: Vec<_> = stacks
            .into_iter()
            .filter(|s| self.project.owns(&s.name))
            .collect();
        tracing::debug!(
            "{} of {} stacks belong to project {}",
            owned.len(),
            total,
            self.project
        );

        Ok(ListOutcome::from_stacks(owned))
    }

    /// Tear down the environment's resources and delete its stack
    ///
    /// Safe to re-issue after a failed destroy.
    pub async fn destroy(&self, environment_id: &str) -> Result<OperationOutcome> {
        let environment = EnvironmentId::parse(environment_id)?;
        let stack_name = StackName::derive(&self.project, &environment);

        let stack = match self
            .engine
            .select_stack(&stack_name, &self.project, &self.program)
            .await
        {
            Ok(stack) => stack,
            Err(EngineError::StackNotFound(_)) => {
                tracing::warn!(
                    "Stack {} not found. It may have already been destroyed.",
                    stack_name
                );
                return Err(LifecycleError::NotFound { stack: stack_name });
            }
            Err(e) => return Err(LifecycleError::engine(Step::Select, &stack_name, e)),
        };

        tracing::info!("Destroying stack {}", stack_name);
        let result = stack
            .destroy()
            .await
            .map_err(|e| LifecycleError::engine(Step::Destroy, &stack_name, e))?;

        if let Some(summary) = result.summary.as_ref().filter(|s| !s.is_empty()) {
            tracing::info!("Resources destroyed: {}", summary);
        }
        tracing::info!("Stack {} destroyed successfully", stack_name);

        self.engine
            .remove_stack(&stack_name)
            .await
            .map_err(|source| LifecycleError::RemovalFailed {
                stack: stack_name.clone(),
                source,
            })?;
        tracing::info!("Stack {} removed completely", stack_name);

        Ok(OperationOutcome {
            operation: Operation::Destroy,
            stack: stack_name,
            outputs: BTreeMap::new(),
            summary: result.summary,
        })
    }
}
