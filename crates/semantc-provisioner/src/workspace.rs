// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ephemeral terraform workspace.
//!
//! Downloads the configuration templates from the blob store into a fresh
//! private directory and scrubs variable-override files. The workspace is
//! owned by one invocation; teardown happens on drop, best-effort, so every
//! exit path of the orchestrator releases it.

use std::path::{Component, Path};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::stores::{BlobStore, StoreError};

/// Suffixes of variable-override files removed after download. Downloaded
/// templates must be parameterized only by the environment the runner
/// injects, never by override files riding along in the bucket.
const OVERRIDE_SUFFIXES: [&str; 4] = [
    ".tfvars",
    ".tfvars.json",
    ".auto.tfvars",
    ".auto.tfvars.json",
];

/// Errors from workspace preparation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkspaceError {
    /// The template bucket contained no objects. An empty workspace is
    /// always an error, never a silent no-op.
    #[error("no terraform configuration files found in bucket {0}")]
    EmptyBucket(String),

    /// Listing or downloading from the blob store failed.
    #[error("failed to fetch templates: {0}")]
    Fetch(#[from] StoreError),

    /// An object name would escape the workspace directory.
    #[error("refusing object name outside workspace: {0}")]
    InvalidObjectName(String),

    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A populated, scrubbed terraform working directory.
///
/// Dropping the workspace recursively deletes the directory; deletion errors
/// are suppressed and deleting an already-removed path is safe.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Download every object in `bucket` into a fresh temp directory,
    /// preserving relative paths, then scrub override files.
    pub async fn build(blob_store: &dyn BlobStore, bucket: &str) -> Result<Self, WorkspaceError> {
        let dir = TempDir::with_prefix("tf-workspace-")?;
        debug!(path = %dir.path().display(), "Created workspace directory");

        let names = blob_store.list(bucket).await?;
        if names.is_empty() {
            return Err(WorkspaceError::EmptyBucket(bucket.to_string()));
        }

        for name in &names {
            // Directory placeholders have nothing to download.
            if name.ends_with('/') {
                continue;
            }
            let relative = sanitized_relative(name)?;
            let target = dir.path().join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = blob_store.fetch(bucket, name).await?;
            tokio::fs::write(&target, &content).await?;
            debug!(object = %name, "Downloaded template");
        }

        let removed = scrub_override_files(dir.path())?;
        if removed > 0 {
            warn!(count = removed, "Removed variable-override files from workspace");
        }

        info!(
            path = %dir.path().display(),
            objects = names.len(),
            "Workspace ready"
        );
        Ok(Self { dir })
    }

    /// Absolute path of the workspace directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Reject absolute object names and parent-directory traversal.
fn sanitized_relative(name: &str) -> Result<&Path, WorkspaceError> {
    let path = Path::new(name);
    let safe = path.components().all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return Err(WorkspaceError::InvalidObjectName(name.to_string()));
    }
    Ok(path)
}

/// Delete every override file under `root`, recursively. Returns the number
/// of files removed.
fn scrub_override_files(root: &Path) -> Result<usize, WorkspaceError> {
    let mut removed = 0;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            removed += scrub_override_files(&path)?;
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if OVERRIDE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            std::fs::remove_file(&path)?;
            debug!(path = %path.display(), "Removed override file");
            removed += 1;
        }
    }
    Ok(removed)
}
