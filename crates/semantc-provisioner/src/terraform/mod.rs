// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Terraform subcommand execution.
//!
//! Defines the command vocabulary the orchestrator drives, the runner trait,
//! and result/error types. Execution backends live in [`runner`] (real
//! processes) and [`mock`] (scripted, for tests).

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub mod diagnostics;
pub mod mock;
pub mod runner;

pub use mock::MockRunner;
pub use runner::ProcessRunner;

/// Name of the saved plan artifact; `apply` always consumes the plan
/// produced immediately before it in the same invocation.
pub const PLAN_FILE: &str = "tfplan";

/// A terraform subcommand invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerraformCommand {
    /// `terraform init` against the local backend.
    Init,
    /// `terraform plan -out=tfplan`. `refresh: false` skips state refresh
    /// (used when force-recreating the per-user identity).
    Plan {
        /// Whether terraform refreshes remote state first.
        refresh: bool,
    },
    /// `terraform apply` of the saved plan artifact.
    Apply,
    /// `terraform import ADDRESS ID` of a pre-existing remote resource.
    Import {
        /// Logical resource address in the configuration.
        address: String,
        /// Remote resource identifier.
        id: String,
    },
}

impl TerraformCommand {
    /// Short subcommand name, for logs and scripted mocks.
    pub fn name(&self) -> &'static str {
        match self {
            TerraformCommand::Init => "init",
            TerraformCommand::Plan { .. } => "plan",
            TerraformCommand::Apply => "apply",
            TerraformCommand::Import { .. } => "import",
        }
    }

    /// Argument vector after the binary name.
    pub fn args(&self) -> Vec<String> {
        match self {
            TerraformCommand::Init => vec!["init".into(), "-no-color".into()],
            TerraformCommand::Plan { refresh } => {
                let mut args = vec![
                    "plan".into(),
                    "-no-color".into(),
                    format!("-out={PLAN_FILE}"),
                ];
                if !refresh {
                    args.push("-refresh=false".into());
                }
                args
            }
            TerraformCommand::Apply => vec![
                "apply".into(),
                "-no-color".into(),
                "-auto-approve".into(),
                PLAN_FILE.into(),
            ],
            TerraformCommand::Import { address, id } => vec![
                "import".into(),
                "-no-color".into(),
                address.clone(),
                id.clone(),
            ],
        }
    }
}

/// Variables injected into the terraform process environment.
#[derive(Debug, Clone)]
pub struct CommandVars {
    /// User the resources belong to.
    pub user_id: String,
    /// Target GCP project.
    pub project_id: String,
    /// Target GCP region.
    pub region: String,
    /// Connector type being provisioned.
    pub connector_type: String,
    /// Master service account identity terraform runs as.
    pub master_service_account: String,
}

/// Output of a successful subcommand.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Full captured stdout.
    pub stdout: String,
    /// Wall-clock execution time.
    pub duration: Duration,
}

/// Errors from running a terraform subcommand.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommandError {
    /// The subcommand exited non-zero. `reason` is the extracted
    /// human-readable failure line, not the raw stderr dump.
    #[error("terraform {subcommand} failed: {reason}")]
    ExitCode {
        /// Subcommand that failed.
        subcommand: &'static str,
        /// Process exit code (-1 when terminated by signal).
        code: i32,
        /// Extracted failure reason.
        reason: String,
        /// Full captured stderr, for logs.
        stderr: String,
    },

    /// The subcommand did not finish within its wall-clock timeout. The
    /// child process has been killed by the time this is returned.
    #[error("terraform {subcommand} timed out after {timeout_secs} seconds")]
    TimedOut {
        /// Subcommand that timed out.
        subcommand: &'static str,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },

    /// The process could not be spawned or its output not collected.
    #[error("failed to run terraform: {0}")]
    Spawn(#[from] std::io::Error),
}

impl CommandError {
    /// Whether this failure was a timeout.
    pub fn timed_out(&self) -> bool {
        matches!(self, CommandError::TimedOut { .. })
    }

    /// The reason string persisted to the status record.
    pub fn reason(&self) -> String {
        match self {
            CommandError::ExitCode { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// Trait for terraform subcommand execution.
///
/// Runners are pure execution engines: they never touch stores or status.
/// The orchestrator owns sequencing and classification of outcomes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one subcommand in `workdir` with the given variables, enforcing
    /// `timeout` as a wall-clock limit.
    async fn run(
        &self,
        command: &TerraformCommand,
        workdir: &Path,
        vars: &CommandVars,
        timeout: Duration,
    ) -> Result<CommandResult, CommandError>;
}
