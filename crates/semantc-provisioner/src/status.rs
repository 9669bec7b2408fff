// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provisioning request and connector status document model.
//!
//! The connector record is a per-user document owned by the onboarding flow;
//! the provisioner only merge-writes the status fields defined here. Writes
//! are last-writer-wins: concurrent provisioning attempts for the same user
//! are not serialized by this service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Connector type used when the request does not name one.
pub const DEFAULT_CONNECTOR_TYPE: &str = "xero";

/// An inbound provisioning request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    /// User the resources are provisioned for.
    #[serde(default)]
    pub user_id: String,
    /// Connector type, e.g. "xero".
    #[serde(default = "default_connector_type")]
    pub connector_type: String,
    /// Delete the per-user identity and recreate from a clean slate.
    #[serde(default)]
    pub force: bool,
}

fn default_connector_type() -> String {
    DEFAULT_CONNECTOR_TYPE.to_string()
}

impl Default for ProvisioningRequest {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            connector_type: default_connector_type(),
            force: false,
        }
    }
}

/// Provisioning phase recorded on the connector document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStatus {
    /// A provisioning run has started and not yet finished.
    InProgress,
    /// The last provisioning run applied successfully.
    Completed,
    /// The last provisioning run failed.
    Failed,
}

/// The per-user connector document, as far as the provisioner reads it.
///
/// Unknown fields are preserved in `rest` so a later merge never has to
/// reconstruct them.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorRecord {
    /// Status of the most recent provisioning phase written.
    #[serde(rename = "provisioningStatus")]
    pub provisioning_status: Option<ProvisioningStatus>,
    /// Remaining document fields (per-connector sub-maps, timestamps).
    #[serde(flatten)]
    pub rest: Value,
}

/// Merge body marking a run as started.
///
/// Written before any externally visible side effect so a crash mid-run
/// leaves a truthful `in_progress` record.
pub fn in_progress_patch(now: DateTime<Utc>) -> Value {
    json!({
        "provisioningStatus": ProvisioningStatus::InProgress,
        "lastProvisioningAttempt": now.to_rfc3339(),
    })
}

/// Merge body for a successful run.
pub fn completed_patch(connector_type: &str, now: DateTime<Utc>, duration_secs: f64) -> Value {
    json!({
        "lastProvisioned": now.to_rfc3339(),
        "provisioningStatus": ProvisioningStatus::Completed,
        "provisioningDuration": duration_secs,
        connector_type: {
            "resourcesProvisioned": true,
            "lastProvisioned": now.to_rfc3339(),
        },
    })
}

/// Merge body for a failed run. `reason` is the extracted human-readable
/// failure reason, not a raw output dump.
pub fn failed_patch(reason: &str, now: DateTime<Utc>, duration_secs: f64) -> Value {
    json!({
        "lastProvisioned": now.to_rfc3339(),
        "provisioningStatus": ProvisioningStatus::Failed,
        "provisioningError": reason,
        "provisioningDuration": duration_secs,
    })
}
