// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Collaborator contracts for external stores and services.
//!
//! The orchestrator only sees these traits. Production wires the GCP REST
//! implementations from [`gcp`]; tests wire the in-memory implementations
//! from [`memory`].

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::status::ConnectorRecord;

pub mod gcp;
pub mod memory;

pub use gcp::{AccessTokenProvider, CloudSchedulerJobs, FirestoreStatusStore, GcsBlobStore, IamAccountService};
pub use memory::{MemoryBlobStore, MemoryStatusStore, RecordingAccountService, RecordingScheduler};

/// Errors from store and service operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The remote endpoint was unreachable.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote endpoint returned a non-success status.
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        /// Operation that failed, e.g. "firestore merge".
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Credential acquisition failed.
    #[error("Failed to acquire access token: {0}")]
    Auth(String),

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Per-user connector status document: read-one and merge-write.
///
/// `merge` has partial-field semantics: fields absent from the patch are
/// preserved on the stored document, including inside nested maps.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Fetch the connector record for a user, `None` if the document is absent.
    async fn get(&self, user_id: &str) -> Result<Option<ConnectorRecord>>;

    /// Merge-write a partial update onto the user's connector record.
    async fn merge(&self, user_id: &str, patch: Value) -> Result<()>;
}

/// Blob container holding the terraform configuration templates.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every object name in the bucket.
    async fn list(&self, bucket: &str) -> Result<Vec<String>>;

    /// Download one object in full.
    async fn fetch(&self, bucket: &str, name: &str) -> Result<Vec<u8>>;
}

/// Account-management service used for force-mode identity cleanup.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Delete a service account by email. Absence of the account is not an
    /// error; other failures are surfaced to the caller, who treats them as
    /// best-effort.
    async fn delete_service_account(&self, email: &str) -> Result<()>;
}

/// Recurring-job service the connector sync is registered with.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Idempotently create (or leave in place) the sync job for a user's
    /// connector.
    async fn ensure_sync_job(&self, user_id: &str, connector_type: &str) -> Result<()>;
}
