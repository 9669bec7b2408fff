// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock terraform runner for testing.
//!
//! Scripted per-subcommand outcomes plus an ordered invocation log, so
//! orchestrator tests can assert sequencing without spawning processes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use super::diagnostics::extract_failure_reason;
use super::{CommandError, CommandResult, CommandRunner, CommandVars, TerraformCommand};

/// Scripted outcome for one subcommand.
#[derive(Debug, Clone)]
enum Outcome {
    Success { stdout: String },
    Fail { code: i32, stderr: String },
    TimeOut,
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    /// Subcommand name ("init", "plan", "apply", "import").
    pub subcommand: &'static str,
    /// Full command value as invoked.
    pub command: TerraformCommand,
    /// Working directory the command ran in.
    pub workdir: PathBuf,
    /// Variables passed.
    pub vars: CommandVars,
}

/// Mock runner with scripted outcomes.
#[derive(Default)]
pub struct MockRunner {
    outcomes: Mutex<HashMap<&'static str, Outcome>>,
    invocations: Mutex<Vec<RecordedInvocation>>,
}

impl MockRunner {
    /// Create a runner where every subcommand succeeds with empty stdout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful outcome with the given stdout.
    pub fn succeed_on(self, subcommand: &'static str, stdout: &str) -> Self {
        self.outcomes.lock().unwrap().insert(
            subcommand,
            Outcome::Success {
                stdout: stdout.to_string(),
            },
        );
        self
    }

    /// Script a non-zero exit with the given stderr.
    pub fn fail_on(self, subcommand: &'static str, code: i32, stderr: &str) -> Self {
        self.outcomes.lock().unwrap().insert(
            subcommand,
            Outcome::Fail {
                code,
                stderr: stderr.to_string(),
            },
        );
        self
    }

    /// Script a timeout.
    pub fn time_out_on(self, subcommand: &'static str) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(subcommand, Outcome::TimeOut);
        self
    }

    /// Every invocation recorded, in call order.
    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Subcommand names in call order.
    pub fn subcommands(&self) -> Vec<&'static str> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|i| i.subcommand)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        command: &TerraformCommand,
        workdir: &Path,
        vars: &CommandVars,
        timeout: Duration,
    ) -> Result<CommandResult, CommandError> {
        let subcommand = command.name();
        self.invocations.lock().unwrap().push(RecordedInvocation {
            subcommand,
            command: command.clone(),
            workdir: workdir.to_path_buf(),
            vars: vars.clone(),
        });

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(subcommand)
            .cloned()
            .unwrap_or(Outcome::Success {
                stdout: String::new(),
            });

        match outcome {
            Outcome::Success { stdout } => Ok(CommandResult {
                stdout,
                duration: Duration::from_millis(1),
            }),
            Outcome::Fail { code, stderr } => Err(CommandError::ExitCode {
                subcommand,
                code,
                reason: extract_failure_reason(&stderr, code),
                stderr,
            }),
            Outcome::TimeOut => Err(CommandError::TimedOut {
                subcommand,
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> CommandVars {
        CommandVars {
            user_id: "u1".into(),
            project_id: "p".into(),
            region: "r".into(),
            connector_type: "xero".into(),
            master_service_account: "m".into(),
        }
    }

    #[tokio::test]
    async fn default_outcome_is_success() {
        let runner = MockRunner::new();
        let result = runner
            .run(
                &TerraformCommand::Init,
                Path::new("/tmp"),
                &vars(),
                Duration::from_secs(1),
            )
            .await;
        assert!(result.is_ok());
        assert_eq!(runner.subcommands(), vec!["init"]);
    }

    #[tokio::test]
    async fn scripted_failure_extracts_reason() {
        let runner = MockRunner::new().fail_on("apply", 1, "Error: permission denied");
        let err = runner
            .run(
                &TerraformCommand::Apply,
                Path::new("/tmp"),
                &vars(),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "permission denied");
        assert!(!err.timed_out());
    }
}
