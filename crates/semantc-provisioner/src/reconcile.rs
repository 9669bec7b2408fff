// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pre-apply reconciliation of the per-user identity resource.
//!
//! Force mode deletes the stale service account so apply starts from a
//! clean slate; normal mode tries to import an existing account into
//! terraform state so apply does not attempt to recreate it. Both paths are
//! best-effort: the main plan/apply cycle proceeds regardless.

use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::stores::AccountService;
use crate::terraform::{CommandError, CommandRunner, CommandVars, TerraformCommand};

/// Logical address of the per-user service account in the configuration.
pub const USER_SA_ADDRESS: &str = "module.user_resources.google_service_account.user_sa";

/// Stderr marker terraform emits when the remote resource is absent.
const NON_EXISTENT_MARKER: &str = "Cannot import non-existent remote object";

/// Deterministic email of the per-user identity resource:
/// `usr-<first 12 chars of userId>-sa@<project>.iam.<domain>`.
pub fn service_account_email(user_id: &str, project_id: &str, domain: &str) -> String {
    // Truncate by characters, not bytes: user ids are free-form strings.
    let prefix: String = user_id.chars().take(12).collect();
    format!("usr-{prefix}-sa@{project_id}.iam.{domain}")
}

/// Force-mode cleanup: delete the identity resource before the main cycle.
/// Deletion failure (typically: account absent) is logged and tolerated.
pub async fn force_cleanup(accounts: &dyn AccountService, email: &str) {
    info!(email = %email, "Force cleanup requested, deleting service account");
    match accounts.delete_service_account(email).await {
        Ok(()) => info!(email = %email, "Service account cleaned up"),
        Err(e) => {
            warn!(email = %email, error = %e, "Service account cleanup failed (may not exist)")
        }
    }
}

/// Normal-mode reconciliation: import the existing identity resource into
/// terraform state. A non-existent remote object is the expected benign
/// case; any other failure is logged and the flow continues, since apply
/// will surface real problems.
pub async fn import_existing(
    runner: &dyn CommandRunner,
    workdir: &Path,
    vars: &CommandVars,
    email: &str,
    timeout: Duration,
) {
    let command = TerraformCommand::Import {
        address: USER_SA_ADDRESS.to_string(),
        id: format!(
            "projects/{}/serviceAccounts/{email}",
            vars.project_id
        ),
    };
    match runner.run(&command, workdir, vars, timeout).await {
        Ok(_) => info!(email = %email, "Imported existing service account"),
        Err(CommandError::ExitCode { ref stderr, .. }) if stderr.contains(NON_EXISTENT_MARKER) => {
            info!(email = %email, "Service account does not exist yet, apply will create it")
        }
        Err(e) => {
            warn!(email = %email, error = %e, "Import failed (expected for new resources)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::RecordingAccountService;
    use crate::terraform::MockRunner;

    fn vars() -> CommandVars {
        CommandVars {
            user_id: "abcdefghijklmnop".into(),
            project_id: "semantc-sandbox".into(),
            region: "us-central1".into(),
            connector_type: "xero".into(),
            master_service_account: "master@semantc-sandbox.iam.gserviceaccount.com".into(),
        }
    }

    #[test]
    fn email_truncates_long_user_ids() {
        assert_eq!(
            service_account_email("abcdefghijklmnop", "semantc-sandbox", "gserviceaccount.com"),
            "usr-abcdefghijkl-sa@semantc-sandbox.iam.gserviceaccount.com"
        );
    }

    #[test]
    fn email_truncation_respects_char_boundaries() {
        // 'é' is two bytes and straddles the 12-byte mark.
        assert_eq!(
            service_account_email("abcdefghijké-rest", "p", "gserviceaccount.com"),
            "usr-abcdefghijké-sa@p.iam.gserviceaccount.com"
        );
    }

    #[test]
    fn email_keeps_short_user_ids_whole() {
        assert_eq!(
            service_account_email("u1", "p", "gserviceaccount.com"),
            "usr-u1-sa@p.iam.gserviceaccount.com"
        );
    }

    #[tokio::test]
    async fn force_cleanup_tolerates_delete_failure() {
        let accounts = RecordingAccountService::failing();
        force_cleanup(&accounts, "usr-u1-sa@p.iam.gserviceaccount.com").await;
        assert_eq!(accounts.deletes().len(), 1);
    }

    #[tokio::test]
    async fn import_runs_with_resource_address() {
        let runner = MockRunner::new();
        let workdir = tempfile::TempDir::new().unwrap();
        import_existing(
            &runner,
            workdir.path(),
            &vars(),
            "usr-abcdefghijkl-sa@semantc-sandbox.iam.gserviceaccount.com",
            Duration::from_secs(1),
        )
        .await;

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        match &invocations[0].command {
            TerraformCommand::Import { address, id } => {
                assert_eq!(address, USER_SA_ADDRESS);
                assert!(id.starts_with("projects/semantc-sandbox/serviceAccounts/usr-"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn import_failure_does_not_panic_or_propagate() {
        let runner = MockRunner::new().fail_on(
            "import",
            1,
            "Error: Cannot import non-existent remote object",
        );
        let workdir = tempfile::TempDir::new().unwrap();
        import_existing(
            &runner,
            workdir.path(),
            &vars(),
            "usr-u1-sa@p.iam.gserviceaccount.com",
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(runner.subcommands(), vec!["import"]);
    }
}
