// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for semantc-provisioner.

use thiserror::Error;

/// Provisioning errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Request validation failed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No connector record exists for the user.
    #[error("No connector document found for user {0}")]
    RecordNotFound(String),

    /// Terraform install or verification failed.
    #[error("Toolchain setup failed: {0}")]
    ToolSetup(#[from] crate::toolchain::ToolSetupError),

    /// Workspace preparation failed.
    #[error("Workspace error: {0}")]
    Workspace(#[from] crate::workspace::WorkspaceError),

    /// A terraform subcommand failed or timed out.
    #[error("{0}")]
    Command(#[from] crate::terraform::CommandError),

    /// A document/blob store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] crate::stores::StoreError),
}

/// Result type using provisioner Error.
pub type Result<T> = std::result::Result<T, Error>;
