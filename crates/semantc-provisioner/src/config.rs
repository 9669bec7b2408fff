// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for semantc-provisioner.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default terraform release to install when `TERRAFORM_VERSION` is unset.
pub const DEFAULT_TERRAFORM_VERSION: &str = "1.5.7";

/// Per-subcommand wall-clock timeouts for terraform.
///
/// These are policy knobs, not code paths: force-mode and import behavior
/// share the same runner and differ only in the values configured here.
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    /// Timeout for `terraform init`.
    pub init: Duration,
    /// Timeout for `terraform plan`.
    pub plan: Duration,
    /// Timeout for `terraform apply`.
    pub apply: Duration,
    /// Timeout for `terraform import` (best-effort reconciliation).
    pub import: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            init: Duration::from_secs(180),
            plan: Duration::from_secs(300),
            apply: Duration::from_secs(600),
            import: Duration::from_secs(120),
        }
    }
}

impl TimeoutPolicy {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            init: env_secs("TF_TIMEOUT_INIT_SECS").unwrap_or(defaults.init),
            plan: env_secs("TF_TIMEOUT_PLAN_SECS").unwrap_or(defaults.plan),
            apply: env_secs("TF_TIMEOUT_APPLY_SECS").unwrap_or(defaults.apply),
            import: env_secs("TF_TIMEOUT_IMPORT_SECS").unwrap_or(defaults.import),
        }
    }
}

fn env_secs(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}

/// Provisioner configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address for the provisioning API.
    pub http_addr: SocketAddr,
    /// GCP project the per-user resources are created in.
    pub project_id: String,
    /// GCP region passed to terraform.
    pub region: String,
    /// GCS bucket holding the terraform configuration templates.
    pub config_bucket: String,
    /// Terraform version to install.
    pub terraform_version: String,
    /// Base URL for terraform release archives.
    pub release_base_url: String,
    /// Directory the terraform binary is installed into.
    pub install_dir: PathBuf,
    /// Master service account identity passed to terraform.
    pub master_service_account: String,
    /// IAM service-account domain used for the per-user identity.
    pub iam_domain: String,
    /// Per-subcommand terraform timeouts.
    pub timeouts: TimeoutPolicy,
    /// Cron schedule for the per-connector sync job.
    pub scheduler_cron: String,
    /// Target URI the sync job posts to.
    pub scheduler_target_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let http_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let project_id = std::env::var("GOOGLE_PROJECT")
            .unwrap_or_else(|_| "semantc-sandbox".to_string());

        let region =
            std::env::var("GOOGLE_REGION").unwrap_or_else(|_| "us-central1".to_string());

        let config_bucket = std::env::var("TERRAFORM_CONFIG_BUCKET")
            .unwrap_or_else(|_| "semantc-terraform-configs".to_string());

        let terraform_version = std::env::var("TERRAFORM_VERSION")
            .unwrap_or_else(|_| DEFAULT_TERRAFORM_VERSION.to_string());

        let release_base_url = std::env::var("TERRAFORM_RELEASE_BASE_URL")
            .unwrap_or_else(|_| "https://releases.hashicorp.com/terraform".to_string());

        let install_dir = PathBuf::from(
            std::env::var("TERRAFORM_INSTALL_DIR").unwrap_or_else(|_| "/tmp/terraform".to_string()),
        );

        let master_service_account = std::env::var("MASTER_SERVICE_ACCOUNT").unwrap_or_else(|_| {
            format!("provisioner@{project_id}.iam.gserviceaccount.com")
        });

        let iam_domain =
            std::env::var("IAM_DOMAIN").unwrap_or_else(|_| "gserviceaccount.com".to_string());

        let scheduler_cron =
            std::env::var("SYNC_JOB_CRON").unwrap_or_else(|_| "0 */6 * * *".to_string());

        let scheduler_target_url = std::env::var("SYNC_JOB_TARGET_URL").unwrap_or_else(|_| {
            format!("https://{region}-{project_id}.cloudfunctions.net/run-connector-sync")
        });

        Ok(Self {
            http_addr,
            project_id,
            region,
            config_bucket,
            terraform_version,
            release_base_url,
            install_dir,
            master_service_account,
            iam_domain,
            timeouts: TimeoutPolicy::from_env(),
            scheduler_cron,
            scheduler_target_url,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The port number is invalid.
    #[error("Invalid port number")]
    InvalidPort,
}
