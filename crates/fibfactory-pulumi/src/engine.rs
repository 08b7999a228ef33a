//! Pulumi automation engine implementation

use crate::cli::PulumiCli;
use crate::error::PulumiError;
use crate::program::read_project_name;
use async_trait::async_trait;
use fibfactory_core::{
    AutomationEngine, ConfigValue, DestroyResult, EngineResult, InfrastructureProgram,
    ProjectName, StackHandle, StackName, StackSummary, UpResult, UpdateSummary,
};

/// Automation engine driving the pulumi CLI
pub struct PulumiEngine {
    cli: PulumiCli,
}

impl PulumiEngine {
    pub fn new(cli: PulumiCli) -> Self {
        Self { cli }
    }

    /// CLI bound to the program's directory, after checking it declares `project`
    async fn program_cli(
        &self,
        project: &ProjectName,
        program: &InfrastructureProgram,
    ) -> EngineResult<PulumiCli> {
        let declared = read_project_name(program.work_dir()).await?;
        if declared != project.as_str() {
            return Err(PulumiError::InvalidProgram(format!(
                "program in {} declares project '{}', expected '{}'",
                program.work_dir().display(),
                declared,
                project
            ))
            .into());
        }
        Ok(self.cli.in_dir(program.work_dir()))
    }
}

#[async_trait]
impl AutomationEngine for PulumiEngine {
    type Stack = PulumiStack;

    fn name(&self) -> &str {
        "pulumi"
    }

    async fn check(&self) -> EngineResult<String> {
        Ok(self.cli.version().await?)
    }

    async fn select_or_create_stack(
        &self,
        name: &StackName,
        project: &ProjectName,
        program: &InfrastructureProgram,
    ) -> EngineResult<Self::Stack> {
        let cli = self.program_cli(project, program).await?;
        cli.select_stack(name.as_str(), true).await?;
        Ok(PulumiStack {
            name: name.clone(),
            cli,
        })
    }

    async fn select_stack(
        &self,
        name: &StackName,
        project: &ProjectName,
        program: &InfrastructureProgram,
    ) -> EngineResult<Self::Stack> {
        let cli = self.program_cli(project, program).await?;
        cli.select_stack(name.as_str(), false).await?;
        Ok(PulumiStack {
            name: name.clone(),
            cli,
        })
    }

    async fn list_stacks(&self) -> EngineResult<Vec<StackSummary>> {
        let stacks = self.cli.list_stacks().await?;
        Ok(stacks.into_iter().map(StackSummary::from).collect())
    }

    async fn remove_stack(&self, name: &StackName) -> EngineResult<()> {
        Ok(self.cli.remove_stack(name.as_str()).await?)
    }
}

/// A pulumi stack selected in a program directory
pub struct PulumiStack {
    name: StackName,
    cli: PulumiCli,
}

impl PulumiStack {
    /// Resource changes of the last update; missing history is not an error
    async fn last_summary(&self, expected_kind: &str) -> Option<UpdateSummary> {
        match self.cli.latest_update(self.name.as_str()).await {
            Ok(Some(update)) if update.kind == expected_kind => Some(update.summary()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Could not read history of stack {}: {}", self.name, e);
                None
            }
        }
    }
}

#[async_trait]
impl StackHandle for PulumiStack {
    fn name(&self) -> &StackName {
        &self.name
    }

    async fn set_config(&self, key: &str, value: &ConfigValue) -> EngineResult<()> {
        Ok(self.cli.set_config(self.name.as_str(), key, value).await?)
    }

    async fn up(&self) -> EngineResult<UpResult> {
        self.cli.up(self.name.as_str()).await?;
        let outputs = self.cli.stack_outputs(self.name.as_str()).await?;
        let summary = self.last_summary("update").await;
        Ok(UpResult { outputs, summary })
    }

    async fn destroy(&self) -> EngineResult<DestroyResult> {
        self.cli.destroy(self.name.as_str()).await?;
        let summary = self.last_summary("destroy").await;
        Ok(DestroyResult { summary })
    }
}
