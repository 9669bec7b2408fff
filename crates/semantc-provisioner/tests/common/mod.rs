// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for orchestrator and server tests.
//!
//! Provides a `TestContext` wiring the orchestrator to in-memory stores and
//! a scripted terraform runner, so end-to-end flows run without network or
//! subprocess access.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use semantc_provisioner::config::Config;
use semantc_provisioner::orchestrator::Orchestrator;
use semantc_provisioner::stores::{
    MemoryBlobStore, MemoryStatusStore, RecordingAccountService, RecordingScheduler, StatusStore,
};
use semantc_provisioner::terraform::MockRunner;
use semantc_provisioner::toolchain::MockToolchain;

/// Config pointing at nothing real; tests never leave the process.
pub fn test_config() -> Config {
    Config {
        http_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        project_id: "test-project".to_string(),
        region: "us-central1".to_string(),
        config_bucket: "test-configs".to_string(),
        terraform_version: "1.5.7".to_string(),
        release_base_url: "http://127.0.0.1:1/terraform".to_string(),
        install_dir: PathBuf::from("/tmp/terraform-test"),
        master_service_account: "provisioner@test-project.iam.gserviceaccount.com".to_string(),
        iam_domain: "gserviceaccount.com".to_string(),
        timeouts: Default::default(),
        scheduler_cron: "0 */6 * * *".to_string(),
        scheduler_target_url: "https://example.invalid/run-connector-sync".to_string(),
    }
}

/// A runner scripted to succeed on every subcommand of the normal flow.
pub fn happy_runner() -> MockRunner {
    MockRunner::new()
        .succeed_on("init", "Terraform has been successfully initialized!")
        .succeed_on("import", "Import successful!")
        .succeed_on("plan", "Plan: 3 to add, 0 to change, 0 to destroy.")
        .succeed_on("apply", "Apply complete! Resources: 3 added.")
}

/// Test context wiring an orchestrator to in-memory collaborators.
pub struct TestContext {
    pub status: Arc<MemoryStatusStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub accounts: Arc<RecordingAccountService>,
    pub scheduler: Arc<RecordingScheduler>,
    pub runner: Arc<MockRunner>,
    pub orchestrator: Orchestrator,
}

impl TestContext {
    /// Build a context around a scripted runner, with a seeded connector
    /// record for `user_id` and a template object in the blob store.
    pub fn new(user_id: &str, runner: MockRunner) -> Self {
        let status = Arc::new(MemoryStatusStore::new());
        status.seed(user_id, json!({"createdAt": "2026-01-01T00:00:00Z"}));

        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.insert("main.tf", b"resource \"google_service_account\" \"user_sa\" {}");
        blobs.insert("variables.tf", b"variable \"user_id\" {}");

        Self::assemble(status, blobs, runner)
    }

    /// Build a context whose template bucket is empty.
    pub fn with_empty_bucket(user_id: &str, runner: MockRunner) -> Self {
        let status = Arc::new(MemoryStatusStore::new());
        status.seed(user_id, json!({}));
        Self::assemble(status, Arc::new(MemoryBlobStore::new()), runner)
    }

    /// Build a context with no connector record seeded.
    pub fn without_record(runner: MockRunner) -> Self {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.insert("main.tf", b"{}");
        Self::assemble(Arc::new(MemoryStatusStore::new()), blobs, runner)
    }

    fn assemble(
        status: Arc<MemoryStatusStore>,
        blobs: Arc<MemoryBlobStore>,
        runner: MockRunner,
    ) -> Self {
        let accounts = Arc::new(RecordingAccountService::new());
        let scheduler = Arc::new(RecordingScheduler::new());
        let runner = Arc::new(runner);

        let orchestrator = Orchestrator::builder(test_config())
            .status_store(status.clone() as Arc<dyn StatusStore>)
            .blob_store(blobs.clone())
            .accounts(accounts.clone())
            .scheduler(scheduler.clone())
            .toolchain(Arc::new(MockToolchain::installed("/bin/true")))
            .runner(runner.clone())
            .build()
            .unwrap();

        Self {
            status,
            blobs,
            accounts,
            scheduler,
            runner,
            orchestrator,
        }
    }
}
