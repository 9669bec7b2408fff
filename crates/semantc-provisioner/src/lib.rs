// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Semantc Provisioner - Per-User Connector Resource Provisioning
//!
//! This crate provisions cloud resources for a user's connector by driving
//! terraform against a configuration template fetched from object storage.
//! It exposes a small HTTP API and records progress on the user's connector
//! status document so that clients can observe the outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Backend Services                          │
//! │                   (POST /provision requests)                     │
//! └──────────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                  semantc-provisioner (This Crate)                │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────────┐   │
//! │  │ Toolchain │  │ Workspace │  │ Terraform │  │ Orchestrator │   │
//! │  │ Installer │  │  Builder  │  │  Runner   │  │              │   │
//! │  └───────────┘  └───────────┘  └───────────┘  └──────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//!        │                │               │                │
//!        │ releases       │ templates     │ spawn          │ status
//!        ▼                ▼               ▼                ▼
//! ┌────────────┐  ┌─────────────┐  ┌────────────┐  ┌──────────────┐
//! │ HashiCorp  │  │   Object    │  │ terraform  │  │   Document   │
//! │  releases  │  │   storage   │  │  process   │  │    store     │
//! └────────────┘  └─────────────┘  └────────────┘  └──────────────┘
//! ```
//!
//! # Provisioning Flow
//!
//! | Phase | Action |
//! |-------|--------|
//! | Validate | Reject requests without a `userId`; 404 when no connector record exists |
//! | Mark | Merge-write `in_progress` onto the status document |
//! | Toolchain | Download, unpack and verify the pinned terraform binary |
//! | Cleanup | Force mode: delete the per-user service account first |
//! | Workspace | Fetch templates into an isolated directory, scrub override files |
//! | Init | `terraform init` with a local state backend |
//! | Reconcile | Normal mode: best-effort import of the existing identity |
//! | Plan | `terraform plan -out=tfplan` (`-refresh=false` in force mode) |
//! | Apply | `terraform apply` of the saved plan |
//! | Finish | Merge-write `completed` or `failed`, register the sync job |
//!
//! # Configuration
//!
//! All configuration comes from environment variables; see [`config::Config`].
//!
//! | Variable | Default | Purpose |
//! |----------|---------|---------|
//! | `PORT` | `8080` | HTTP listen port |
//! | `GOOGLE_PROJECT` | `semantc-sandbox` | Target GCP project |
//! | `GOOGLE_REGION` | `us-central1` | Target region |
//! | `TERRAFORM_CONFIG_BUCKET` | `semantc-terraform-configs` | Template bucket |
//! | `TERRAFORM_VERSION` | `1.5.7` | Pinned terraform release |
//! | `TERRAFORM_INSTALL_DIR` | `/tmp/terraform` | Binary install directory |
//!
//! # Testing
//!
//! Every external collaborator sits behind a trait with an in-memory
//! implementation: [`stores::MemoryStatusStore`], [`stores::MemoryBlobStore`],
//! [`terraform::MockRunner`] and [`toolchain::MockToolchain`]. Integration
//! tests drive the orchestrator end to end without touching the network.

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod reconcile;
pub mod server;
pub mod status;
pub mod stores;
pub mod terraform;
pub mod toolchain;
pub mod workspace;

pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
