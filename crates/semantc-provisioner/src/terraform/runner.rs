// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process-backed terraform runner.
//!
//! Spawns the terraform binary as a child process with an explicit
//! per-invocation environment overlay. The ambient process environment is
//! inherited but never mutated, so concurrent invocations cannot observe
//! each other's variables.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::diagnostics::extract_failure_reason;
use super::{CommandError, CommandResult, CommandRunner, CommandVars, TerraformCommand};

/// Backend pinning for init and plan: force local state so a bucket-side
/// backend block cannot redirect state writes.
const CLI_ARGS_INIT: &str = "-backend=true -backend-config=\"path=terraform.tfstate\"";

/// Explicit empty var-file source for plan: guarantees workspace scrubbing
/// cannot be bypassed by an auto-discovered override file.
const CLI_ARGS_PLAN: &str = "-var-file=/dev/null";

/// Terraform runner that executes real child processes.
pub struct ProcessRunner {
    binary: PathBuf,
}

impl ProcessRunner {
    /// Create a runner for the given terraform binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Environment overlay for one invocation.
    fn build_env(command: &TerraformCommand, vars: &CommandVars) -> Vec<(String, String)> {
        let mut env = vec![
            ("GOOGLE_PROJECT".to_string(), vars.project_id.clone()),
            ("TF_VAR_user_id".to_string(), vars.user_id.clone()),
            ("TF_VAR_project_id".to_string(), vars.project_id.clone()),
            ("TF_VAR_region".to_string(), vars.region.clone()),
            (
                "TF_VAR_connector_type".to_string(),
                vars.connector_type.clone(),
            ),
            (
                "TF_VAR_master_service_account".to_string(),
                vars.master_service_account.clone(),
            ),
            ("TF_IN_AUTOMATION".to_string(), "true".to_string()),
            ("TF_INPUT".to_string(), "false".to_string()),
            ("TF_CLI_ARGS".to_string(), "-no-color".to_string()),
        ];
        match command {
            TerraformCommand::Init => {
                env.push(("TF_CLI_ARGS_init".to_string(), CLI_ARGS_INIT.to_string()));
            }
            TerraformCommand::Plan { .. } => {
                env.push(("TF_CLI_ARGS_init".to_string(), CLI_ARGS_INIT.to_string()));
                env.push(("TF_CLI_ARGS_plan".to_string(), CLI_ARGS_PLAN.to_string()));
            }
            TerraformCommand::Apply | TerraformCommand::Import { .. } => {}
        }
        env
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &TerraformCommand,
        workdir: &Path,
        vars: &CommandVars,
        timeout: Duration,
    ) -> Result<CommandResult, CommandError> {
        let subcommand = command.name();
        let start = Instant::now();

        debug!(
            subcommand = subcommand,
            workdir = %workdir.display(),
            user_id = %vars.user_id,
            timeout_secs = timeout.as_secs(),
            "Running terraform subcommand"
        );

        let mut cmd = Command::new(&self.binary);
        cmd.args(command.args())
            .current_dir(workdir)
            .envs(Self::build_env(command, vars))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must not leave the child
            // running in the background.
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(
                    subcommand = subcommand,
                    timeout_secs = timeout.as_secs(),
                    "Terraform subcommand timed out, child killed"
                );
                return Err(CommandError::TimedOut {
                    subcommand,
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            info!(
                subcommand = subcommand,
                duration_ms = duration.as_millis() as u64,
                "Terraform subcommand completed"
            );
            return Ok(CommandResult { stdout, duration });
        }

        let code = output.status.code().unwrap_or(-1);
        let reason = extract_failure_reason(&stderr, code);
        error!(
            subcommand = subcommand,
            exit_code = code,
            reason = %reason,
            "Terraform subcommand failed"
        );
        Err(CommandError::ExitCode {
            subcommand,
            code,
            reason,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vars() -> CommandVars {
        CommandVars {
            user_id: "user-1".into(),
            project_id: "proj".into(),
            region: "us-central1".into(),
            connector_type: "xero".into(),
            master_service_account: "master@proj.iam.gserviceaccount.com".into(),
        }
    }

    #[test]
    fn env_overlay_carries_tf_vars() {
        let env = ProcessRunner::build_env(&TerraformCommand::Init, &test_vars());
        let lookup = |key: &str| {
            env.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(lookup("TF_VAR_user_id"), Some("user-1"));
        assert_eq!(lookup("TF_INPUT"), Some("false"));
        assert_eq!(lookup("TF_CLI_ARGS"), Some("-no-color"));
        assert_eq!(lookup("TF_CLI_ARGS_init"), Some(CLI_ARGS_INIT));
        assert_eq!(lookup("TF_CLI_ARGS_plan"), None);
    }

    #[test]
    fn plan_env_pins_var_file() {
        let env = ProcessRunner::build_env(&TerraformCommand::Plan { refresh: true }, &test_vars());
        assert!(env.iter().any(|(k, v)| k == "TF_CLI_ARGS_plan" && v == CLI_ARGS_PLAN));
        assert!(env.iter().any(|(k, _)| k == "TF_CLI_ARGS_init"));
    }

    #[test]
    fn apply_env_has_no_subcommand_pinning() {
        let env = ProcessRunner::build_env(&TerraformCommand::Apply, &test_vars());
        assert!(!env.iter().any(|(k, _)| k == "TF_CLI_ARGS_plan"));
        assert!(!env.iter().any(|(k, _)| k == "TF_CLI_ARGS_init"));
    }
}
