//! pulumi CLI wrapper
//!
//! Wraps the pulumi CLI commands used to drive environment stacks. Every
//! stack-scoped command passes `--stack` explicitly so that concurrent runs
//! never depend on the workspace's currently selected stack.

use crate::error::{PulumiError, Result};
use chrono::{DateTime, Utc};
use fibfactory_core::{ConfigValue, StackSummary, UpdateSummary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Lines of streamed output kept for error messages
const OUTPUT_TAIL_LINES: usize = 20;

/// pulumi CLI wrapper
#[derive(Debug, Clone)]
pub struct PulumiCli {
    binary: PathBuf,
    work_dir: PathBuf,
    envs: Vec<(String, String)>,
}

impl PulumiCli {
    pub fn new(binary: impl AsRef<Path>, work_dir: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            work_dir: work_dir.as_ref().to_path_buf(),
            envs: Vec::new(),
        }
    }

    /// Extra environment variable for every invocation (e.g. `PULUMI_BACKEND_URL`)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Same CLI, run from another project directory
    pub fn in_dir(&self, work_dir: impl AsRef<Path>) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            ..self.clone()
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--non-interactive").arg("--cwd").arg(&self.work_dir);
        cmd.args(args);
        cmd.env("PULUMI_SKIP_UPDATE_CHECK", "true");
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!(
            "Running: {} --cwd {} {}",
            self.binary.display(),
            self.work_dir.display(),
            args.join(" ")
        );
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> PulumiError {
        if err.kind() == std::io::ErrorKind::NotFound {
            PulumiError::PulumiNotFound(self.binary.display().to_string())
        } else {
            PulumiError::IoError(err)
        }
    }

    /// Run a pulumi command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(args, &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a long pulumi command, logging its progress output line by line
    async fn run_streaming(&self, args: &[&str]) -> Result<()> {
        let mut child = self
            .command(args)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PulumiError::InvalidOutput("stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| PulumiError::InvalidOutput("stderr not captured".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut buf).await {
                tracing::warn!("Could not read pulumi stderr: {}", e);
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        // The child is always awaited, even when reading its output failed
        let mut tail: VecDeque<String> = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        let streamed = log_progress(stdout, &mut tail).await;
        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        streamed?;

        if !status.success() {
            let message = if stderr.trim().is_empty() {
                tail.into_iter().collect::<Vec<_>>().join("\n")
            } else {
                stderr
            };
            return Err(classify_failure(args, &message));
        }

        Ok(())
    }

    /// Installed pulumi version
    pub async fn version(&self) -> Result<String> {
        let output = self.run_command(&["version"]).await?;
        Ok(output.trim().to_string())
    }

    /// Select a stack, optionally creating it when it does not exist
    pub async fn select_stack(&self, name: &str, create: bool) -> Result<()> {
        let mut args = vec!["stack", "select", name];
        if create {
            args.push("--create");
        }
        self.run_command(&args).await?;
        Ok(())
    }

    /// Set a configuration value on a stack
    pub async fn set_config(&self, stack: &str, key: &str, value: &ConfigValue) -> Result<()> {
        let visibility = if value.secret { "--secret" } else { "--plaintext" };
        self.run_command(&[
            "config",
            "set",
            key,
            value.value.as_str(),
            visibility,
            "--stack",
            stack,
        ])
        .await?;
        Ok(())
    }

    /// Deploy the stack
    pub async fn up(&self, stack: &str) -> Result<()> {
        self.run_streaming(&["up", "--yes", "--skip-preview", "--stack", stack])
            .await
    }

    /// Destroy all resources of the stack
    ///
    /// Refreshes first so resources already gone are dropped from the state
    /// instead of failing the teardown.
    pub async fn destroy(&self, stack: &str) -> Result<()> {
        self.run_streaming(&[
            "destroy",
            "--yes",
            "--skip-preview",
            "--refresh",
            "--stack",
            stack,
        ])
        .await
    }

    /// Outputs exported by the last update
    pub async fn stack_outputs(&self, stack: &str) -> Result<BTreeMap<String, serde_json::Value>> {
        let output = self
            .run_command(&[
                "stack",
                "output",
                "--json",
                "--show-secrets",
                "--stack",
                stack,
            ])
            .await?;
        parse_outputs(&output)
    }

    /// Most recent update recorded in the stack's history
    pub async fn latest_update(&self, stack: &str) -> Result<Option<UpdateInfo>> {
        let output = self
            .run_command(&[
                "stack",
                "history",
                "--json",
                "--page-size",
                "1",
                "--stack",
                stack,
            ])
            .await?;
        let history = parse_history(&output)?;
        Ok(history.into_iter().next())
    }

    /// Delete the stack and its history
    pub async fn remove_stack(&self, stack: &str) -> Result<()> {
        self.run_command(&["stack", "rm", stack, "--yes"]).await?;
        Ok(())
    }

    /// List stacks of every project in the backend
    pub async fn list_stacks(&self) -> Result<Vec<StackInfo>> {
        let output = self.run_command(&["stack", "ls", "--all", "--json"]).await?;
        parse_stack_list(&output)
    }
}

/// Log each non-blank output line, keeping the last few for error messages
///
/// Lines are decoded lossily since pulumi passes docker build output through.
async fn log_progress<R>(output: R, tail: &mut VecDeque<String>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        tracing::info!("{}", line);
        if tail.len() == OUTPUT_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }
}

/// Map a failed command's error output onto an error kind
fn classify_failure(args: &[&str], message: &str) -> PulumiError {
    let stack = stack_argument(args).unwrap_or_default();
    let lowered = message.to_lowercase();

    if lowered.contains("no stack named") {
        return PulumiError::StackNotFound(stack);
    }
    if lowered.contains("another update is currently in progress")
        || lowered.contains("conflict: another update")
    {
        return PulumiError::UpdateConflict(stack);
    }

    PulumiError::CommandFailed {
        command: args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
        message: message.trim().to_string(),
    }
}

/// Stack name a command targets: the `--stack` value or the `stack select|rm` operand
fn stack_argument(args: &[&str]) -> Option<String> {
    if let Some(pos) = args.iter().position(|a| *a == "--stack") {
        return args.get(pos + 1).map(|s| s.to_string());
    }
    match args {
        ["stack", "select" | "rm", name, ..] => Some(name.to_string()),
        _ => None,
    }
}

/// Stack entry of `pulumi stack ls --json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackInfo {
    pub name: String,

    #[serde(default)]
    pub current: bool,

    pub last_update: Option<String>,

    #[serde(default)]
    pub update_in_progress: bool,

    pub resource_count: Option<u64>,

    pub url: Option<String>,
}

impl StackInfo {
    /// Stack name without an `org/project/` qualifier
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.last_update
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

impl From<StackInfo> for StackSummary {
    fn from(info: StackInfo) -> Self {
        Self {
            name: info.short_name().to_string(),
            last_update: info.last_update_time(),
            update_in_progress: info.update_in_progress,
            resource_count: info.resource_count,
            url: info.url,
        }
    }
}

/// Entry of `pulumi stack history --json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub kind: String,

    pub result: Option<String>,

    pub start_time: Option<String>,

    pub end_time: Option<String>,

    #[serde(default)]
    pub resource_changes: BTreeMap<String, u64>,
}

impl UpdateInfo {
    pub fn summary(&self) -> UpdateSummary {
        UpdateSummary {
            resource_changes: self.resource_changes.clone(),
        }
    }
}

fn parse_stack_list(output: &str) -> Result<Vec<StackInfo>> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(output)?)
}

fn parse_history(output: &str) -> Result<Vec<UpdateInfo>> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(output)?)
}

fn parse_outputs(output: &str) -> Result<BTreeMap<String, serde_json::Value>> {
    if output.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    match serde_json::from_str(output)? {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(PulumiError::InvalidOutput(format!(
            "expected stack outputs object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stack_list() {
        let output = r#"[
            {
                "name": "fibfactory-test1",
                "current": true,
                "lastUpdate": "2024-05-02T18:21:07.000Z",
                "updateInProgress": false,
                "resourceCount": 4,
                "url": "https://app.pulumi.com/acme/fibfactory/fibfactory-test1"
            },
            {
                "name": "acme/webshop/dev",
                "current": false,
                "updateInProgress": true
            }
        ]"#;

        let stacks = parse_stack_list(output).unwrap();
        assert_eq!(stacks.len(), 2);
        assert_eq!(stacks[0].resource_count, Some(4));
        assert!(stacks[0].last_update_time().is_some());
        assert_eq!(stacks[1].short_name(), "dev");
        assert!(stacks[1].last_update_time().is_none());

        let summary: StackSummary = stacks[1].clone().into();
        assert_eq!(summary.name, "dev");
        assert!(summary.update_in_progress);
    }

    #[test]
    fn test_parse_empty_stack_list() {
        assert!(parse_stack_list("").unwrap().is_empty());
        assert!(parse_stack_list("[]").unwrap().is_empty());
    }

    #[test]
    fn test_unparseable_last_update_is_ignored() {
        let output = r#"[{"name": "fibfactory-a", "lastUpdate": "n/a"}]"#;
        let stacks = parse_stack_list(output).unwrap();
        assert!(stacks[0].last_update_time().is_none());
    }

    #[test]
    fn test_parse_history() {
        let output = r#"[
            {
                "kind": "destroy",
                "startTime": "2024-05-02T18:30:00.000Z",
                "message": "",
                "environment": {"exec.kind": "cli"},
                "config": {},
                "result": "succeeded",
                "endTime": "2024-05-02T18:34:10.000Z",
                "resourceChanges": {"delete": 4}
            }
        ]"#;

        let history = parse_history(output).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, "destroy");
        assert_eq!(history[0].summary().count("delete"), 4);
    }

    #[test]
    fn test_parse_outputs() {
        let output = r#"{"app_runner_service_url": "jdamju6gpd.us-west-2.awsapprunner.com"}"#;
        let outputs = parse_outputs(output).unwrap();
        assert_eq!(
            outputs["app_runner_service_url"],
            "jdamju6gpd.us-west-2.awsapprunner.com"
        );

        assert!(parse_outputs("{}\n").unwrap().is_empty());
        assert!(matches!(
            parse_outputs("[]"),
            Err(PulumiError::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_classify_missing_stack() {
        let err = classify_failure(
            &["stack", "select", "fibfactory-ghost"],
            "error: no stack named 'fibfactory-ghost' found\n",
        );
        assert!(matches!(err, PulumiError::StackNotFound(name) if name == "fibfactory-ghost"));
    }

    #[test]
    fn test_classify_update_conflict() {
        let err = classify_failure(
            &["up", "--yes", "--skip-preview", "--stack", "fibfactory-a"],
            "error: [409] Conflict: Another update is currently in progress.",
        );
        assert!(matches!(err, PulumiError::UpdateConflict(name) if name == "fibfactory-a"));
    }

    #[test]
    fn test_classify_generic_failure() {
        let err = classify_failure(
            &["stack", "rm", "fibfactory-a", "--yes"],
            "error: 'fibfactory-a' still has resources\n",
        );
        match err {
            PulumiError::CommandFailed { command, message } => {
                assert_eq!(command, "stack rm");
                assert_eq!(message, "error: 'fibfactory-a' still has resources");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_log_progress_decodes_invalid_utf8() {
        let output: &[u8] = b"\xff\xfe docker layer\n\n   + app-image create\r\nno newline";
        let mut tail = VecDeque::new();

        log_progress(output, &mut tail).await.unwrap();

        assert_eq!(tail.len(), 3);
        assert!(tail[0].ends_with(" docker layer"));
        assert_eq!(tail[1], "   + app-image create");
        assert_eq!(tail[2], "no newline");
    }

    #[tokio::test]
    async fn test_log_progress_keeps_last_lines() {
        let output = (0..30).map(|i| format!("line {}\n", i)).collect::<String>();
        let mut tail = VecDeque::new();

        log_progress(output.as_bytes(), &mut tail).await.unwrap();

        assert_eq!(tail.len(), OUTPUT_TAIL_LINES);
        assert_eq!(tail.front().map(String::as_str), Some("line 10"));
        assert_eq!(tail.back().map(String::as_str), Some("line 29"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cli = PulumiCli::new(dir.path().join("no-such-pulumi"), dir.path());

        let err = cli.version().await.unwrap_err();
        assert!(matches!(err, PulumiError::PulumiNotFound(_)));
    }
}
