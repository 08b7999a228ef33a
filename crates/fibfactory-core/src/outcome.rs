//! Results of lifecycle operations

use crate::naming::StackName;
use crate::stack::{SERVICE_URL_OUTPUT, StackSummary, UpdateSummary};
use serde::Serialize;
use std::collections::BTreeMap;

/// Lifecycle operation exposed to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    List,
    Destroy,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::List => write!(f, "list"),
            Operation::Destroy => write!(f, "destroy"),
        }
    }
}

/// Successful create or destroy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationOutcome {
    pub operation: Operation,
    pub stack: StackName,

    /// Named outputs of the stack; empty after destroy
    pub outputs: BTreeMap<String, serde_json::Value>,

    /// Resource changes reported by the engine, if any
    pub summary: Option<UpdateSummary>,
}

impl OperationOutcome {
    /// Public URL of the deployed service
    pub fn service_url(&self) -> Option<&str> {
        self.outputs
            .get(SERVICE_URL_OUTPUT)
            .and_then(serde_json::Value::as_str)
            .filter(|url| !url.is_empty())
    }
}

/// Result of listing environments
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "environments", rename_all = "snake_case")]
pub enum ListOutcome {
    /// No stack in the workspace belongs to this project
    NoEnvironments,
    Environments(Vec<StackSummary>),
}

impl ListOutcome {
    pub fn from_stacks(stacks: Vec<StackSummary>) -> Self {
        if stacks.is_empty() {
            ListOutcome::NoEnvironments
        } else {
            ListOutcome::Environments(stacks)
        }
    }

    pub fn stacks(&self) -> &[StackSummary] {
        match self {
            ListOutcome::NoEnvironments => &[],
            ListOutcome::Environments(stacks) => stacks,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.stacks().iter().map(|s| s.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ListOutcome::NoEnvironments)
    }
}
