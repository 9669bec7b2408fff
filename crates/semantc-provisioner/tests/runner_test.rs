// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ProcessRunner tests against real child processes.
//!
//! Each test writes a small shell script standing in for the terraform
//! binary, so exit codes, stderr capture, env overlay and timeout handling
//! are exercised end to end without a real terraform install.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use semantc_provisioner::terraform::{
    CommandError, CommandRunner, CommandVars, ProcessRunner, TerraformCommand,
};

fn vars() -> CommandVars {
    CommandVars {
        user_id: "runner-test-user".to_string(),
        project_id: "test-project".to_string(),
        region: "us-central1".to_string(),
        connector_type: "xero".to_string(),
        master_service_account: "provisioner@test-project.iam.gserviceaccount.com".to_string(),
    }
}

fn write_script(dir: &std::path::Path, body: &str) -> PathBuf {
    let path = dir.join("terraform");
    let script = format!("#!/bin/sh\n{body}\n");
    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[tokio::test]
async fn successful_command_captures_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_script(dir.path(), "echo \"Apply complete!\"; exit 0");
    let runner = ProcessRunner::new(binary);

    let result = runner
        .run(
            &TerraformCommand::Apply,
            dir.path(),
            &vars(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

    assert!(result.stdout.contains("Apply complete!"));
}

#[tokio::test]
async fn nonzero_exit_yields_extracted_reason() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_script(
        dir.path(),
        "echo \"Error: quota exceeded for project\" >&2; exit 1",
    );
    let runner = ProcessRunner::new(binary);

    let err = runner
        .run(
            &TerraformCommand::Init,
            dir.path(),
            &vars(),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

    match err {
        CommandError::ExitCode {
            subcommand,
            code,
            reason,
            ..
        } => {
            assert_eq!(subcommand, "init");
            assert_eq!(code, 1);
            assert_eq!(reason, "quota exceeded for project");
        }
        other => panic!("expected ExitCode, got {other:?}"),
    }
}

#[tokio::test]
async fn user_variables_reach_the_child_environment() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_script(
        dir.path(),
        "printf '%s/%s' \"$TF_VAR_user_id\" \"$TF_VAR_connector_type\"",
    );
    let runner = ProcessRunner::new(binary);

    let result = runner
        .run(
            &TerraformCommand::Plan { refresh: true },
            dir.path(),
            &vars(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

    assert_eq!(result.stdout, "runner-test-user/xero");
}

#[tokio::test]
async fn timeout_kills_the_child_and_reports_it() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("child.pid");
    let binary = write_script(
        dir.path(),
        &format!("echo $$ > {}\nsleep 30", pid_file.display()),
    );
    let runner = ProcessRunner::new(binary);

    let start = Instant::now();
    let err = runner
        .run(
            &TerraformCommand::Apply,
            dir.path(),
            &vars(),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

    assert!(err.timed_out());
    // It returned on the timeout, not on the 30s sleep.
    assert!(start.elapsed() < Duration::from_secs(10));

    // The child was killed, not abandoned in the background. The kill is
    // asynchronous, so poll briefly for the process to disappear.
    let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
    let mut alive = true;
    for _ in 0..50 {
        alive = std::process::Command::new("kill")
            .args(["-0", &pid])
            .status()
            .unwrap()
            .success();
        if !alive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(!alive, "child process {pid} still running after timeout");
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ProcessRunner::new(dir.path().join("does-not-exist"));

    let err = runner
        .run(
            &TerraformCommand::Init,
            dir.path(),
            &vars(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::Spawn(_)));
}
