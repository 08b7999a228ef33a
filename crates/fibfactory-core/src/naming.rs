//! Environment identifiers and stack naming
//!
//! A stack name is always `{project}-{environment}`. Both parts are validated
//! against a character set accepted by every system the name flows into
//! (Pulumi stack names, Docker tags and App Runner service names), so that a
//! bad id is rejected here instead of deep inside a cloud API call.

use crate::error::{LifecycleError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Longest accepted environment id.
///
/// `fib-app-{id}-service` must fit App Runner's 40 character service name limit.
pub const MAX_ENVIRONMENT_ID_LEN: usize = 24;

/// Longest stack name the Pulumi backends accept
pub const MAX_STACK_NAME_LEN: usize = 100;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("name pattern is a valid regex")
});

/// User-supplied identifier of one ephemeral environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentId(String);

impl EnvironmentId {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "environment id must not be empty".to_string(),
            ));
        }
        if raw.len() > MAX_ENVIRONMENT_ID_LEN {
            return Err(LifecycleError::InvalidInput(format!(
                "environment id '{}' is longer than {} characters",
                raw, MAX_ENVIRONMENT_ID_LEN
            )));
        }
        if !NAME_PATTERN.is_match(raw) {
            return Err(LifecycleError::InvalidInput(format!(
                "environment id '{}' must start with a letter or digit and contain only letters, digits, '-' and '_'",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Application name handed to the infrastructure program
    pub fn app_name(&self) -> String {
        format!("fib-app-{}", self.0)
    }
}

impl std::fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Project every stack of this tool is created under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(raw: &str) -> Result<Self> {
        if raw.is_empty() || !NAME_PATTERN.is_match(raw) {
            return Err(LifecycleError::InvalidInput(format!(
                "project name '{}' must start with a letter or digit and contain only letters, digits, '-' and '_'",
                raw
            )));
        }
        if raw.len() + 1 + MAX_ENVIRONMENT_ID_LEN > MAX_STACK_NAME_LEN {
            return Err(LifecycleError::InvalidInput(format!(
                "project name '{}' leaves no room for environment ids",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by all stack names of this project
    pub fn stack_prefix(&self) -> String {
        format!("{}-", self.0)
    }

    /// Whether a stack name reported by the engine belongs to this project
    pub fn owns(&self, stack_name: &str) -> bool {
        stack_name.starts_with(&self.stack_prefix())
    }
}

impl std::fmt::Display for ProjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the engine stack backing one environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackName(String);

impl StackName {
    pub fn derive(project: &ProjectName, environment: &EnvironmentId) -> Self {
        Self(format!("{}-{}", project.as_str(), environment.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StackName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StackName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate a raw environment id and derive its stack name
pub fn derive_stack_name(project: &ProjectName, environment_id: &str) -> Result<StackName> {
    let environment = EnvironmentId::parse(environment_id)?;
    Ok(StackName::derive(project, &environment))
}
