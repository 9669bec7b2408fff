// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Semantc Provisioner - HTTP provisioning server
//!
//! An HTTP server responsible for:
//! - Provisioning per-user connector resources via terraform
//! - Recording provisioning status on the connector document
//! - Registering the recurring connector sync job

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use semantc_provisioner::config::Config;
use semantc_provisioner::handlers::AppState;
use semantc_provisioner::orchestrator::Orchestrator;
use semantc_provisioner::server;
use semantc_provisioner::stores::{
    AccessTokenProvider, CloudSchedulerJobs, FirestoreStatusStore, GcsBlobStore, IamAccountService,
};
use semantc_provisioner::terraform::ProcessRunner;
use semantc_provisioner::toolchain::HashicorpInstaller;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "semantc_provisioner=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        project_id = %config.project_id,
        config_bucket = %config.config_bucket,
        terraform_version = %config.terraform_version,
        "Starting Semantc Provisioner"
    );

    let auth = Arc::new(AccessTokenProvider::new());

    let toolchain = Arc::new(HashicorpInstaller::new(
        &config.terraform_version,
        &config.release_base_url,
        &config.install_dir,
    ));
    let runner = Arc::new(ProcessRunner::new(config.install_dir.join("terraform")));

    let orchestrator = Orchestrator::builder(config.clone())
        .status_store(Arc::new(FirestoreStatusStore::new(
            &config.project_id,
            auth.clone(),
        )))
        .blob_store(Arc::new(GcsBlobStore::new(auth.clone())))
        .accounts(Arc::new(IamAccountService::new(
            &config.project_id,
            auth.clone(),
        )))
        .scheduler(Arc::new(CloudSchedulerJobs::new(
            &config.project_id,
            &config.region,
            &config.scheduler_cron,
            &config.scheduler_target_url,
            &config.master_service_account,
            auth,
        )))
        .toolchain(toolchain)
        .runner(runner)
        .build()?;

    let state = Arc::new(AppState {
        orchestrator,
        started_at: Instant::now(),
    });

    server::serve(config.http_addr, state).await
}
