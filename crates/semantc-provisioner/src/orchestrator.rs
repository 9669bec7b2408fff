// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provisioning orchestrator.
//!
//! [`Orchestrator`] owns the full provisioning lifecycle for one request:
//! status transitions, terraform sequencing, reconciliation, and cleanup.
//! Collaborators are injected as trait objects so that every phase can be
//! exercised against in-memory implementations.
//!
//! # Phase order
//!
//! | Phase | Action |
//! |-------|--------|
//! | 1 | Validate request, load the connector record (404 if absent) |
//! | 2 | Merge-write `in_progress` before any external side effect |
//! | 3 | Ensure the terraform binary is installed and runnable |
//! | 4 | Force mode only: delete the per-user service account |
//! | 5 | Build an isolated workspace from the config bucket |
//! | 6 | `terraform init` |
//! | 7 | Normal mode only: best-effort import of the existing identity |
//! | 8 | `terraform plan` (`-refresh=false` in force mode) |
//! | 9 | `terraform apply` of the saved plan |
//! | 10 | Merge-write `completed`, then best-effort sync-job registration |
//!
//! Any phase failure merge-writes `failed` with an extracted reason; a
//! failure of that write itself is logged and never masks the original
//! error. The workspace directory is removed on every exit path.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result as AnyResult;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::reconcile;
use crate::status::{self, ProvisioningRequest};
use crate::stores::{AccountService, BlobStore, JobScheduler, StatusStore};
use crate::terraform::{CommandRunner, CommandVars, TerraformCommand};
use crate::toolchain::Toolchain;
use crate::workspace::Workspace;

/// Builder for an [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: Config,
    status_store: Option<Arc<dyn StatusStore>>,
    blob_store: Option<Arc<dyn BlobStore>>,
    accounts: Option<Arc<dyn AccountService>>,
    scheduler: Option<Arc<dyn JobScheduler>>,
    toolchain: Option<Arc<dyn Toolchain>>,
    runner: Option<Arc<dyn CommandRunner>>,
}

impl OrchestratorBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            status_store: None,
            blob_store: None,
            accounts: None,
            scheduler: None,
            toolchain: None,
            runner: None,
        }
    }

    /// Set the connector status store.
    pub fn status_store(mut self, store: Arc<dyn StatusStore>) -> Self {
        self.status_store = Some(store);
        self
    }

    /// Set the blob store holding terraform configuration templates.
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    /// Set the account service used for force-mode cleanup.
    pub fn accounts(mut self, accounts: Arc<dyn AccountService>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// Set the scheduler the sync job is registered with.
    pub fn scheduler(mut self, scheduler: Arc<dyn JobScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Set the toolchain responsible for the terraform binary.
    pub fn toolchain(mut self, toolchain: Arc<dyn Toolchain>) -> Self {
        self.toolchain = Some(toolchain);
        self
    }

    /// Set the terraform subcommand runner.
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Build the orchestrator, failing if a collaborator is missing.
    pub fn build(self) -> AnyResult<Orchestrator> {
        let status_store = self
            .status_store
            .ok_or_else(|| anyhow::anyhow!("status_store is required"))?;
        let blob_store = self
            .blob_store
            .ok_or_else(|| anyhow::anyhow!("blob_store is required"))?;
        let accounts = self
            .accounts
            .ok_or_else(|| anyhow::anyhow!("accounts is required"))?;
        let scheduler = self
            .scheduler
            .ok_or_else(|| anyhow::anyhow!("scheduler is required"))?;
        let toolchain = self
            .toolchain
            .ok_or_else(|| anyhow::anyhow!("toolchain is required"))?;
        let runner = self
            .runner
            .ok_or_else(|| anyhow::anyhow!("runner is required"))?;

        Ok(Orchestrator {
            config: self.config,
            status_store,
            blob_store,
            accounts,
            scheduler,
            toolchain,
            runner,
        })
    }
}

/// Drives one provisioning request through the full lifecycle.
pub struct Orchestrator {
    config: Config,
    status_store: Arc<dyn StatusStore>,
    blob_store: Arc<dyn BlobStore>,
    accounts: Arc<dyn AccountService>,
    scheduler: Arc<dyn JobScheduler>,
    toolchain: Arc<dyn Toolchain>,
    runner: Arc<dyn CommandRunner>,
}

impl Orchestrator {
    /// Create a builder seeded with `config`.
    pub fn builder(config: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Provision resources for one user's connector.
    ///
    /// Validation failures and a missing connector record return before any
    /// status write. Every later outcome leaves the document in a terminal
    /// `completed` or `failed` state.
    pub async fn provision(&self, request: &ProvisioningRequest) -> Result<()> {
        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(Error::InvalidRequest("missing userId".to_string()));
        }

        if self.status_store.get(user_id).await?.is_none() {
            return Err(Error::RecordNotFound(user_id.to_string()));
        }

        info!(
            user_id = %user_id,
            connector_type = %request.connector_type,
            force = request.force,
            "Starting provisioning"
        );

        let started = Instant::now();
        self.status_store
            .merge(user_id, status::in_progress_patch(Utc::now()))
            .await?;

        match self.run_phases(user_id, request).await {
            Ok(()) => {
                let elapsed = started.elapsed().as_secs_f64();
                if let Err(e) = self
                    .status_store
                    .merge(
                        user_id,
                        status::completed_patch(&request.connector_type, Utc::now(), elapsed),
                    )
                    .await
                {
                    let err = Error::Store(e);
                    self.record_failure(user_id, &err, started.elapsed().as_secs_f64())
                        .await;
                    return Err(err);
                }

                if let Err(e) = self
                    .scheduler
                    .ensure_sync_job(user_id, &request.connector_type)
                    .await
                {
                    warn!(user_id = %user_id, error = %e, "Sync job registration failed");
                }

                info!(
                    user_id = %user_id,
                    duration_secs = elapsed,
                    "Provisioning completed"
                );
                Ok(())
            }
            Err(e) => {
                self.record_failure(user_id, &e, started.elapsed().as_secs_f64())
                    .await;
                Err(e)
            }
        }
    }

    /// Phases 3-9: everything between the `in_progress` and terminal writes.
    async fn run_phases(&self, user_id: &str, request: &ProvisioningRequest) -> Result<()> {
        let binary = self.toolchain.ensure_installed().await?;
        debug!(binary = %binary.display(), "Terraform ready");

        let email = reconcile::service_account_email(
            user_id,
            &self.config.project_id,
            &self.config.iam_domain,
        );

        if request.force {
            reconcile::force_cleanup(self.accounts.as_ref(), &email).await;
        }

        let workspace =
            Workspace::build(self.blob_store.as_ref(), &self.config.config_bucket).await?;
        debug!(dir = %workspace.path().display(), "Workspace prepared");

        let vars = CommandVars {
            user_id: user_id.to_string(),
            project_id: self.config.project_id.clone(),
            region: self.config.region.clone(),
            connector_type: request.connector_type.clone(),
            master_service_account: self.config.master_service_account.clone(),
        };
        let timeouts = &self.config.timeouts;

        self.runner
            .run(
                &TerraformCommand::Init,
                workspace.path(),
                &vars,
                timeouts.init,
            )
            .await?;

        if !request.force {
            reconcile::import_existing(
                self.runner.as_ref(),
                workspace.path(),
                &vars,
                &email,
                timeouts.import,
            )
            .await;
        }

        self.runner
            .run(
                &TerraformCommand::Plan {
                    refresh: !request.force,
                },
                workspace.path(),
                &vars,
                timeouts.plan,
            )
            .await?;

        self.runner
            .run(
                &TerraformCommand::Apply,
                workspace.path(),
                &vars,
                timeouts.apply,
            )
            .await?;

        Ok(())
    }

    /// Merge-write the `failed` status. A write failure here is logged and
    /// swallowed so the original error always reaches the caller.
    async fn record_failure(&self, user_id: &str, error: &Error, elapsed_secs: f64) {
        let reason = failure_reason(error);
        error!(user_id = %user_id, reason = %reason, "Provisioning failed");
        if let Err(write_err) = self
            .status_store
            .merge(
                user_id,
                status::failed_patch(&reason, Utc::now(), elapsed_secs),
            )
            .await
        {
            error!(
                user_id = %user_id,
                error = %write_err,
                "Failed to record failed status"
            );
        }
    }
}

/// Human-readable reason stored on the connector document.
///
/// Terraform failures carry a reason already extracted from stderr;
/// everything else uses the error's display form.
fn failure_reason(error: &Error) -> String {
    match error {
        Error::Command(e) => e.reason(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terraform::CommandError;

    #[test]
    fn command_failures_use_extracted_reason() {
        let err = Error::Command(CommandError::ExitCode {
            subcommand: "apply",
            code: 1,
            reason: "quota exceeded".to_string(),
            stderr: "Error: quota exceeded".to_string(),
        });
        assert_eq!(failure_reason(&err), "quota exceeded");
    }

    #[test]
    fn other_failures_use_display_form() {
        let err = Error::RecordNotFound("u1".to_string());
        assert!(failure_reason(&err).contains("u1"));
    }
}
