// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Shell contributor
//!
//! Runs a shell script and copies its output into the action log.

use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;

use super::{StepContributor, StepInvocation};
use crate::errors::{PlumberError, PlumberResult};
use crate::outcome::Severity;

/// Shell contributor
///
/// Parameters: `script` (required), `shell` (default `bash`),
/// `unstableOnFailure` (report a non-zero exit as UNSTABLE).
pub struct ShellContributor {
    default_shell: String,
}

impl ShellContributor {
    /// Create a new shell contributor
    pub fn new() -> Self {
        Self {
            default_shell: "bash".to_string(),
        }
    }

    /// Use a different shell when the action does not name one
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            default_shell: shell.into(),
        }
    }
}

impl Default for ShellContributor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepContributor for ShellContributor {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run 'script' with 'shell' (default bash)"
    }

    async fn run(&self, invocation: StepInvocation<'_>) -> PlumberResult<Severity> {
        let script = invocation.required_str("shell", "script")?;
        if script.trim().is_empty() {
            return Err(PlumberError::InvalidParam {
                step: "shell".into(),
                param: "script".into(),
                reason: "Shell script is empty".into(),
            });
        }
        let shell = invocation
            .str_param("shell", "shell")?
            .unwrap_or(&self.default_shell);
        let unstable_on_failure = invocation.bool_param("shell", "unstableOnFailure")?;

        let start = Instant::now();

        let mut cmd = Command::new(shell);
        cmd.arg("-c").arg(script);
        cmd.current_dir(invocation.working_dir);
        cmd.envs(invocation.env);

        let output = cmd.output().await.map_err(|e| PlumberError::StepFailed {
            step: "shell".to_string(),
            error: e.to_string(),
            help: Some(format!("Shell '{}' may not be available", shell)),
        })?;

        invocation.log.lines(&String::from_utf8_lossy(&output.stdout));
        invocation.log.lines(&String::from_utf8_lossy(&output.stderr));

        tracing::debug!(
            action = invocation.action,
            status = ?output.status.code(),
            elapsed = ?start.elapsed(),
            "shell step finished"
        );

        if output.status.success() {
            return Ok(Severity::Success);
        }

        let exit_code = output.status.code().unwrap_or(-1);
        invocation
            .log
            .line(&format!("script returned exit code {}", exit_code));

        if unstable_on_failure {
            Ok(Severity::Unstable)
        } else {
            Ok(Severity::Failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{ActionLog, LogRef, MemoryLog};
    use crate::script::Value;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Arc;

    async fn run_shell(params: &[(&str, Value)], env: &[(&str, &str)]) -> (PlumberResult<Severity>, Arc<MemoryLog>) {
        let sink = Arc::new(MemoryLog::new());
        let log = ActionLog::new(sink.clone(), LogRef::action("p", "sh"));
        let params: BTreeMap<String, Value> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let env: BTreeMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let result = ShellContributor::with_shell("sh")
            .run(StepInvocation {
                action: "sh",
                params: &params,
                env: &env,
                log: &log,
                working_dir: Path::new("."),
            })
            .await;
        (result, sink)
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let (result, log) = run_shell(&[("script", Value::str("echo hello"))], &[]).await;
        assert_eq!(result.unwrap(), Severity::Success);
        assert!(log.contains("hello"));
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let (result, log) = run_shell(&[("script", Value::str("echo FOO is $FOO"))], &[("FOO", "bar")]).await;
        assert_eq!(result.unwrap(), Severity::Success);
        assert!(log.contains("FOO is bar"));
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let (result, log) = run_shell(&[("script", Value::str("exit 3"))], &[]).await;
        assert_eq!(result.unwrap(), Severity::Failure);
        assert!(log.contains("exit code 3"));

        let (result, _) = run_shell(
            &[("script", Value::str("exit 1")), ("unstableOnFailure", Value::Bool(true))],
            &[],
        )
        .await;
        assert_eq!(result.unwrap(), Severity::Unstable);
    }

    #[tokio::test]
    async fn test_missing_script_param() {
        let (result, _) = run_shell(&[], &[]).await;
        assert!(matches!(result, Err(PlumberError::InvalidParam { .. })));

        let (result, _) = run_shell(&[("script", Value::str("  "))], &[]).await;
        assert!(result.is_err());
    }
}
