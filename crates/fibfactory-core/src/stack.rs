//! Stack configuration, summaries and engine operation results

use crate::naming::EnvironmentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration key holding the application name
pub const APP_NAME_KEY: &str = "appName";

/// Configuration key holding the port the container listens on
pub const CONTAINER_PORT_KEY: &str = "containerPort";

/// Output exported by the infrastructure program after a successful up
pub const SERVICE_URL_OUTPUT: &str = "app_runner_service_url";

/// Default container port of the demo service
pub const DEFAULT_CONTAINER_PORT: u16 = 8080;

/// A configuration value applied to a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub value: String,

    /// Whether the engine should store the value encrypted
    #[serde(default)]
    pub secret: bool,
}

impl ConfigValue {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: false,
        }
    }
}

/// Configuration every environment stack needs before `up`
///
/// Both keys the infrastructure program requires are fields, so a stack
/// cannot be configured with one of them missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub app_name: String,
    pub container_port: u16,
}

impl StackConfig {
    pub fn for_environment(environment: &EnvironmentId, container_port: u16) -> Self {
        Self {
            app_name: environment.app_name(),
            container_port,
        }
    }

    /// Key/value pairs in the order they are applied
    pub fn entries(&self) -> Vec<(&'static str, ConfigValue)> {
        vec![
            (APP_NAME_KEY, ConfigValue::plain(&self.app_name)),
            (
                CONTAINER_PORT_KEY,
                ConfigValue::plain(self.container_port.to_string()),
            ),
        ]
    }
}

/// A stack as reported by the engine's workspace listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSummary {
    /// Stack name without any organization/project qualifier
    pub name: String,

    /// Last time an update finished, if the engine knows it
    pub last_update: Option<DateTime<Utc>>,

    /// Whether an update is running right now
    #[serde(default)]
    pub update_in_progress: bool,

    /// Number of resources currently tracked by the stack
    pub resource_count: Option<u64>,

    /// Console URL of the stack, for managed backends
    pub url: Option<String>,
}

impl StackSummary {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_update: None,
            update_in_progress: false,
            resource_count: None,
            url: None,
        }
    }
}

/// Resource changes of one engine update, keyed by operation (create, delete, same, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub resource_changes: BTreeMap<String, u64>,
}

impl UpdateSummary {
    pub fn is_empty(&self) -> bool {
        self.resource_changes.values().all(|count| *count == 0)
    }

    pub fn count(&self, operation: &str) -> u64 {
        self.resource_changes.get(operation).copied().unwrap_or(0)
    }
}

impl std::fmt::Display for UpdateSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .resource_changes
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(op, count)| format!("{} {}", count, op))
            .collect();
        if parts.is_empty() {
            write!(f, "no changes")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Result of a successful `up`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpResult {
    pub outputs: BTreeMap<String, serde_json::Value>,
    pub summary: Option<UpdateSummary>,
}

/// Result of a successful `destroy`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestroyResult {
    pub summary: Option<UpdateSummary>,
}
