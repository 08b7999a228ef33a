//! In-memory automation engine
//!
//! Simulates a stack backend without touching a cloud: select-or-create,
//! configuration, up, destroy, remove and listing all operate on a shared
//! in-process table. Failures can be injected per step to exercise the
//! orchestrator's error paths, including partially applied updates.

use crate::engine::{AutomationEngine, InfrastructureProgram, StackHandle};
use crate::error::{EngineError, EngineResult, Step};
use crate::naming::{ProjectName, StackName};
use crate::stack::{
    APP_NAME_KEY, CONTAINER_PORT_KEY, ConfigValue, DestroyResult, SERVICE_URL_OUTPUT,
    StackSummary, UpResult, UpdateSummary,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const IMAGE_RESOURCE: &str = "app-image";
const SERVICE_RESOURCE: &str = "app-runner-service";

#[derive(Debug, Clone, Default)]
struct StoredStack {
    name: String,
    project: Option<String>,
    config: BTreeMap<String, ConfigValue>,
    resources: Vec<String>,
    outputs: BTreeMap<String, serde_json::Value>,
    last_update: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Backend {
    /// Stacks in creation order
    stacks: Vec<StoredStack>,
    failures: HashMap<Step, VecDeque<String>>,
    service_urls: HashMap<String, String>,
    omit_outputs: bool,
    calls: Vec<String>,
}

impl Backend {
    fn find(&self, name: &str) -> Option<&StoredStack> {
        self.stacks.iter().find(|s| s.name == name)
    }

    fn find_mut(&mut self, name: &str) -> EngineResult<&mut StoredStack> {
        self.stacks
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| EngineError::StackNotFound(name.to_string()))
    }

    fn take_failure(&mut self, step: Step) -> Option<String> {
        self.failures.get_mut(&step).and_then(VecDeque::pop_front)
    }

    fn record(&mut self, call: String) {
        self.calls.push(call);
    }
}

/// Automation engine backed by process memory
///
/// Clones share the same backend, so a test can keep one clone for
/// inspection while the orchestrator owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngine {
    backend: Arc<Mutex<Backend>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a stack belonging to some other project
    pub fn add_foreign_stack(&self, name: &str) {
        self.lock().stacks.push(StoredStack {
            name: name.to_string(),
            ..Default::default()
        });
    }

    pub fn with_foreign_stack(self, name: &str) -> Self {
        self.add_foreign_stack(name);
        self
    }

    /// Service URL reported after `up` of the given stack
    pub fn with_service_url(self, stack: &str, url: &str) -> Self {
        self.lock()
            .service_urls
            .insert(stack.to_string(), url.to_string());
        self
    }

    /// Make `up` succeed without exporting any outputs
    pub fn without_outputs(self) -> Self {
        self.lock().omit_outputs = true;
        self
    }

    /// Fail the next call of `step` with `message`
    pub fn fail_next(&self, step: Step, message: &str) {
        self.lock()
            .failures
            .entry(step)
            .or_default()
            .push_back(message.to_string());
    }

    pub fn stack_names(&self) -> Vec<String> {
        self.lock().stacks.iter().map(|s| s.name.clone()).collect()
    }

    pub fn contains(&self, stack: &str) -> bool {
        self.lock().find(stack).is_some()
    }

    /// Resources currently provisioned for a stack
    pub fn resources(&self, stack: &str) -> Vec<String> {
        self.lock()
            .find(stack)
            .map(|s| s.resources.clone())
            .unwrap_or_default()
    }

    pub fn config(&self, stack: &str) -> BTreeMap<String, ConfigValue> {
        self.lock()
            .find(stack)
            .map(|s| s.config.clone())
            .unwrap_or_default()
    }

    pub fn project_of(&self, stack: &str) -> Option<String> {
        self.lock().find(stack).and_then(|s| s.project.clone())
    }

    /// Engine calls in the order they were made, e.g. `up fibfactory-test1`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }
}

#[async_trait]
impl AutomationEngine for InMemoryEngine {
    type Stack = InMemoryStack;

    fn name(&self) -> &str {
        "memory"
    }

    async fn check(&self) -> EngineResult<String> {
        Ok("in-memory engine".to_string())
    }

    async fn select_or_create_stack(
        &self,
        name: &StackName,
        project: &ProjectName,
        _program: &InfrastructureProgram,
    ) -> EngineResult<Self::Stack> {
        let mut backend = self.lock();
        backend.record(format!("select-or-create {}", name));
        if let Some(message) = backend.take_failure(Step::SelectOrCreate) {
            return Err(EngineError::CommandFailed(message));
        }
        if backend.find(name.as_str()).is_none() {
            backend.stacks.push(StoredStack {
                name: name.to_string(),
                project: Some(project.to_string()),
                ..Default::default()
            });
        }
        Ok(InMemoryStack {
            name: name.clone(),
            backend: Arc::clone(&self.backend),
        })
    }

    async fn select_stack(
        &self,
        name: &StackName,
        _project: &ProjectName,
        _program: &InfrastructureProgram,
    ) -> EngineResult<Self::Stack> {
        let mut backend = self.lock();
        backend.record(format!("select {}", name));
        if let Some(message) = backend.take_failure(Step::Select) {
            return Err(EngineError::CommandFailed(message));
        }
        if backend.find(name.as_str()).is_none() {
            return Err(EngineError::StackNotFound(name.to_string()));
        }
        Ok(InMemoryStack {
            name: name.clone(),
            backend: Arc::clone(&self.backend),
        })
    }

    async fn list_stacks(&self) -> EngineResult<Vec<StackSummary>> {
        let mut backend = self.lock();
        backend.record("list".to_string());
        if let Some(message) = backend.take_failure(Step::List) {
            return Err(EngineError::CommandFailed(message));
        }
        Ok(backend
            .stacks
            .iter()
            .map(|s| StackSummary {
                name: s.name.clone(),
                last_update: s.last_update,
                update_in_progress: false,
                resource_count: Some(s.resources.len() as u64),
                url: None,
            })
            .collect())
    }

    async fn remove_stack(&self, name: &StackName) -> EngineResult<()> {
        let mut backend = self.lock();
        backend.record(format!("remove {}", name));
        if let Some(message) = backend.take_failure(Step::Remove) {
            return Err(EngineError::CommandFailed(message));
        }
        let stack = backend.find_mut(name.as_str())?;
        if !stack.resources.is_empty() {
            return Err(EngineError::CommandFailed(format!(
                "stack {} still has {} resources",
                name,
                stack.resources.len()
            )));
        }
        backend.stacks.retain(|s| s.name != name.as_str());
        Ok(())
    }
}

/// Handle to a stack of an [`InMemoryEngine`]
#[derive(Debug, Clone)]
pub struct InMemoryStack {
    name: StackName,
    backend: Arc<Mutex<Backend>>,
}

impl InMemoryStack {
    fn lock(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StackHandle for InMemoryStack {
    fn name(&self) -> &StackName {
        &self.name
    }

    async fn set_config(&self, key: &str, value: &ConfigValue) -> EngineResult<()> {
        let mut backend = self.lock();
        backend.record(format!("set-config {} {}", self.name, key));
        if let Some(message) = backend.take_failure(Step::SetConfig) {
            return Err(EngineError::CommandFailed(message));
        }
        let stack = backend.find_mut(self.name.as_str())?;
        stack.config.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn up(&self) -> EngineResult<UpResult> {
        let mut backend = self.lock();
        backend.record(format!("up {}", self.name));
        let failure = backend.take_failure(Step::Up);
        let omit_outputs = backend.omit_outputs;
        let url = backend.service_urls.get(self.name.as_str()).cloned();
        let stack = backend.find_mut(self.name.as_str())?;

        for key in [APP_NAME_KEY, CONTAINER_PORT_KEY] {
            if !stack.config.contains_key(key) {
                return Err(EngineError::CommandFailed(format!(
                    "Missing required configuration variable '{}'",
                    key
                )));
            }
        }

        let mut summary = UpdateSummary::default();
        let mut provision = |stack: &mut StoredStack, resource: &str| {
            let op = if stack.resources.iter().any(|r| r == resource) {
                "same"
            } else {
                stack.resources.push(resource.to_string());
                "create"
            };
            *summary.resource_changes.entry(op.to_string()).or_default() += 1;
        };

        provision(stack, IMAGE_RESOURCE);
        if let Some(message) = failure {
            // image pushed, service never came up
            return Err(EngineError::CommandFailed(message));
        }
        provision(stack, SERVICE_RESOURCE);

        let app_name = stack
            .config
            .get(APP_NAME_KEY)
            .map(|v| v.value.clone())
            .unwrap_or_default();
        let url = url.unwrap_or_else(|| format!("{}.us-west-2.awsapprunner.com", app_name));

        stack.outputs.clear();
        if !omit_outputs {
            stack
                .outputs
                .insert(SERVICE_URL_OUTPUT.to_string(), serde_json::Value::String(url));
        }
        stack.last_update = Some(Utc::now());

        Ok(UpResult {
            outputs: stack.outputs.clone(),
            summary: Some(summary),
        })
    }

    async fn destroy(&self) -> EngineResult<DestroyResult> {
        let mut backend = self.lock();
        backend.record(format!("destroy {}", self.name));
        let failure = backend.take_failure(Step::Destroy);
        let stack = backend.find_mut(self.name.as_str())?;

        if let Some(message) = failure {
            // the service goes first, the image stays behind
            stack.resources.retain(|r| r != SERVICE_RESOURCE);
            return Err(EngineError::CommandFailed(message));
        }

        let deleted = stack.resources.len() as u64;
        stack.resources.clear();
        stack.outputs.clear();
        stack.last_update = Some(Utc::now());

        let mut summary = UpdateSummary::default();
        if deleted > 0 {
            summary.resource_changes.insert("delete".to_string(), deleted);
        }
        Ok(DestroyResult {
            summary: Some(summary),
        })
    }
}
