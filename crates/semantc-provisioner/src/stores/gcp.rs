// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GCP REST implementations of the store contracts.
//!
//! Firestore for the connector status document, GCS for terraform templates,
//! IAM for force-mode account cleanup, and Cloud Scheduler for the recurring
//! sync job. All calls are authorized with a bearer token from
//! [`AccessTokenProvider`].

use async_trait::async_trait;
use base64::Engine;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::{AccountService, BlobStore, JobScheduler, Result, StatusStore, StoreError};
use crate::status::ConnectorRecord;

/// Metadata-server endpoint for the default service account token.
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh the cached token this long before it actually expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

fn truncated_body(body: String) -> String {
    const LIMIT: usize = 512;
    if body.len() <= LIMIT {
        return body;
    }
    // Back off to a char boundary so multi-byte text cannot panic here.
    let mut end = LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Bearer-token source for outbound GCP calls.
///
/// Uses `GOOGLE_OAUTH_ACCESS_TOKEN` when set (local development), otherwise
/// fetches from the metadata server and caches until shortly before expiry.
pub struct AccessTokenProvider {
    client: reqwest::Client,
    cached: Mutex<Option<(String, Instant)>>,
}

impl Default for AccessTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessTokenProvider {
    /// Create a provider with its own HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Return a token usable as a `Bearer` credential.
    pub async fn token(&self) -> Result<String> {
        if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            return Ok(token);
        }

        let mut cached = self.cached.lock().await;
        if let Some((token, valid_until)) = cached.as_ref()
            && Instant::now() < *valid_until
        {
            return Ok(token.clone());
        }

        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Auth(format!(
                "metadata server returned HTTP {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Auth("metadata response missing access_token".into()))?
            .to_string();
        let expires_in = body.get("expires_in").and_then(Value::as_u64).unwrap_or(300);

        let valid_until = Instant::now() + Duration::from_secs(expires_in)
            - TOKEN_EXPIRY_MARGIN.min(Duration::from_secs(expires_in));
        *cached = Some((token.clone(), valid_until));
        Ok(token)
    }
}

// ============================================================================
// Firestore value mapping
// ============================================================================

/// Encode a JSON value as a Firestore typed value.
fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => json!({"booleanValue": b}),
        Value::Number(n) if n.is_i64() => json!({"integerValue": n.to_string()}),
        Value::Number(n) => json!({"doubleValue": n.as_f64()}),
        Value::String(s) => json!({"stringValue": s}),
        Value::Array(items) => json!({
            "arrayValue": {"values": items.iter().map(to_firestore_value).collect::<Vec<_>>()}
        }),
        Value::Object(map) => json!({"mapValue": {"fields": to_firestore_fields(map)}}),
    }
}

/// Encode a JSON object as a Firestore `fields` map.
fn to_firestore_fields(map: &Map<String, Value>) -> Value {
    let fields: Map<String, Value> = map
        .iter()
        .map(|(k, v)| (k.clone(), to_firestore_value(v)))
        .collect();
    Value::Object(fields)
}

/// Decode a Firestore typed value back to plain JSON.
fn from_firestore_value(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return Value::Null;
    };
    if let Some(v) = map.get("booleanValue") {
        return v.clone();
    }
    if let Some(v) = map.get("stringValue").or(map.get("timestampValue")) {
        return v.clone();
    }
    if let Some(v) = map.get("integerValue") {
        return v
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or(Value::Null);
    }
    if let Some(v) = map.get("doubleValue") {
        return v.clone();
    }
    if let Some(v) = map.get("mapValue") {
        return from_firestore_fields(v.get("fields").unwrap_or(&Value::Null));
    }
    if let Some(v) = map.get("arrayValue") {
        let items = v
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(from_firestore_value).collect())
            .unwrap_or_default();
        return Value::Array(items);
    }
    Value::Null
}

/// Decode a Firestore `fields` map to a plain JSON object.
fn from_firestore_fields(fields: &Value) -> Value {
    let map = fields
        .as_object()
        .map(|m| {
            m.iter()
                .map(|(k, v)| (k.clone(), from_firestore_value(v)))
                .collect()
        })
        .unwrap_or_default();
    Value::Object(map)
}

/// Dotted leaf field paths for an update mask.
///
/// Firestore's `updateMask` with leaf paths gives recursive-merge semantics:
/// sibling fields inside nested maps stay untouched.
fn leaf_paths(patch: &Value) -> Vec<String> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        format!("`{key}`")
                    } else {
                        format!("{prefix}.`{key}`")
                    };
                    walk(&path, child, out);
                }
            }
            _ => out.push(prefix.to_string()),
        }
    }
    let mut out = Vec::new();
    walk("", patch, &mut out);
    out
}

/// Firestore-backed status store.
///
/// The connector document lives at
/// `users/{userId}/integrations/connectors`, matching the onboarding flow.
pub struct FirestoreStatusStore {
    client: reqwest::Client,
    auth: Arc<AccessTokenProvider>,
    base_url: String,
}

impl FirestoreStatusStore {
    /// Create a store for the given project.
    pub fn new(project_id: &str, auth: Arc<AccessTokenProvider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            base_url: format!(
                "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents"
            ),
        }
    }

    fn document_url(&self, user_id: &str) -> String {
        format!("{}/users/{user_id}/integrations/connectors", self.base_url)
    }
}

#[async_trait]
impl StatusStore for FirestoreStatusStore {
    async fn get(&self, user_id: &str) -> Result<Option<ConnectorRecord>> {
        let token = self.auth.token().await?;
        let response = self
            .client
            .get(self.document_url(user_id))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Status {
                operation: "firestore get",
                status: response.status().as_u16(),
                body: truncated_body(response.text().await.unwrap_or_default()),
            });
        }

        let document: Value = response.json().await?;
        let fields = from_firestore_fields(document.get("fields").unwrap_or(&Value::Null));
        Ok(Some(serde_json::from_value(fields)?))
    }

    async fn merge(&self, user_id: &str, patch: Value) -> Result<()> {
        let token = self.auth.token().await?;
        let mask: Vec<(String, String)> = leaf_paths(&patch)
            .into_iter()
            .map(|p| ("updateMask.fieldPaths".to_string(), p))
            .collect();
        let fields = match &patch {
            Value::Object(map) => to_firestore_fields(map),
            _ => return Err(StoreError::Other("merge patch must be an object".into())),
        };

        let response = self
            .client
            .patch(self.document_url(user_id))
            .query(&mask)
            .bearer_auth(token)
            .json(&json!({"fields": fields}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status {
                operation: "firestore merge",
                status: response.status().as_u16(),
                body: truncated_body(response.text().await.unwrap_or_default()),
            });
        }
        debug!(user_id = %user_id, "Merged connector status document");
        Ok(())
    }
}

// ============================================================================
// GCS
// ============================================================================

/// GCS-backed blob store for terraform templates.
pub struct GcsBlobStore {
    client: reqwest::Client,
    auth: Arc<AccessTokenProvider>,
    base_url: String,
}

impl GcsBlobStore {
    /// Create a store against the public GCS endpoint.
    pub fn new(auth: Arc<AccessTokenProvider>) -> Self {
        Self::with_base_url(auth, "https://storage.googleapis.com")
    }

    /// Create a store against a custom endpoint (tests, emulators).
    pub fn with_base_url(auth: Arc<AccessTokenProvider>, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        let token = self.auth.token().await?;
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/storage/v1/b/{bucket}/o", self.base_url))
                .bearer_auth(&token);
            if let Some(ref t) = page_token {
                request = request.query(&[("pageToken", t)]);
            }
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(StoreError::Status {
                    operation: "gcs list",
                    status: response.status().as_u16(),
                    body: truncated_body(response.text().await.unwrap_or_default()),
                });
            }
            let body: Value = response.json().await?;
            if let Some(items) = body.get("items").and_then(Value::as_array) {
                names.extend(
                    items
                        .iter()
                        .filter_map(|i| i.get("name").and_then(Value::as_str))
                        .map(str::to_string),
                );
            }
            match body.get("nextPageToken").and_then(Value::as_str) {
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(names)
    }

    async fn fetch(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        let token = self.auth.token().await?;
        let encoded = urlencoding::encode(name);
        let response = self
            .client
            .get(format!(
                "{}/storage/v1/b/{bucket}/o/{encoded}?alt=media",
                self.base_url
            ))
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Status {
                operation: "gcs fetch",
                status: response.status().as_u16(),
                body: truncated_body(response.text().await.unwrap_or_default()),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

// ============================================================================
// IAM
// ============================================================================

/// IAM-backed account service for force-mode cleanup.
pub struct IamAccountService {
    client: reqwest::Client,
    auth: Arc<AccessTokenProvider>,
    project_id: String,
}

impl IamAccountService {
    /// Create a service for the given project.
    pub fn new(project_id: &str, auth: Arc<AccessTokenProvider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            project_id: project_id.to_string(),
        }
    }
}

#[async_trait]
impl AccountService for IamAccountService {
    async fn delete_service_account(&self, email: &str) -> Result<()> {
        let token = self.auth.token().await?;
        let response = self
            .client
            .delete(format!(
                "https://iam.googleapis.com/v1/projects/{}/serviceAccounts/{email}",
                self.project_id
            ))
            .bearer_auth(token)
            .send()
            .await?;

        // Absent account means there is nothing to clean up.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(email = %email, "Service account already absent");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(StoreError::Status {
                operation: "iam delete",
                status: response.status().as_u16(),
                body: truncated_body(response.text().await.unwrap_or_default()),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Cloud Scheduler
// ============================================================================

/// Cloud Scheduler implementation of the recurring-job contract.
pub struct CloudSchedulerJobs {
    client: reqwest::Client,
    auth: Arc<AccessTokenProvider>,
    project_id: String,
    region: String,
    cron: String,
    target_url: String,
    invoker_service_account: String,
}

impl CloudSchedulerJobs {
    /// Create a scheduler client.
    pub fn new(
        project_id: &str,
        region: &str,
        cron: &str,
        target_url: &str,
        invoker_service_account: &str,
        auth: Arc<AccessTokenProvider>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            project_id: project_id.to_string(),
            region: region.to_string(),
            cron: cron.to_string(),
            target_url: target_url.to_string(),
            invoker_service_account: invoker_service_account.to_string(),
        }
    }

    fn job_id(user_id: &str) -> String {
        let prefix: String = user_id.chars().take(12).collect();
        format!("connector-sync-{prefix}")
    }

    fn jobs_url(&self) -> String {
        format!(
            "https://cloudscheduler.googleapis.com/v1/projects/{}/locations/{}/jobs",
            self.project_id, self.region
        )
    }
}

#[async_trait]
impl JobScheduler for CloudSchedulerJobs {
    async fn ensure_sync_job(&self, user_id: &str, connector_type: &str) -> Result<()> {
        let token = self.auth.token().await?;
        let job_id = Self::job_id(user_id);

        // Get-or-create: an existing job is left untouched.
        let existing = self
            .client
            .get(format!("{}/{job_id}", self.jobs_url()))
            .bearer_auth(&token)
            .send()
            .await?;
        if existing.status().is_success() {
            debug!(job_id = %job_id, "Sync job already registered");
            return Ok(());
        }
        if existing.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::Status {
                operation: "scheduler get",
                status: existing.status().as_u16(),
                body: truncated_body(existing.text().await.unwrap_or_default()),
            });
        }

        let body = base64::engine::general_purpose::STANDARD.encode(
            serde_json::to_vec(&json!({
                "userId": user_id,
                "connectorType": connector_type,
            }))?,
        );
        let job = json!({
            "name": format!(
                "projects/{}/locations/{}/jobs/{job_id}",
                self.project_id, self.region
            ),
            "schedule": self.cron,
            "timeZone": "UTC",
            "httpTarget": {
                "uri": self.target_url,
                "httpMethod": "POST",
                "body": body,
                "headers": {"Content-Type": "application/json"},
                "oidcToken": {"serviceAccountEmail": self.invoker_service_account},
            },
        });

        let response = self
            .client
            .post(self.jobs_url())
            .bearer_auth(token)
            .json(&job)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Status {
                operation: "scheduler create",
                status: response.status().as_u16(),
                body: truncated_body(response.text().await.unwrap_or_default()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firestore_roundtrip_preserves_structure() {
        let original = json!({
            "provisioningStatus": "completed",
            "provisioningDuration": 42.5,
            "xero": {"resourcesProvisioned": true, "attempts": 3},
        });
        let encoded = to_firestore_fields(original.as_object().unwrap());
        let decoded = from_firestore_fields(&encoded);
        assert_eq!(decoded, original);
    }

    #[test]
    fn leaf_paths_descend_into_maps() {
        let patch = json!({
            "provisioningStatus": "completed",
            "xero": {"resourcesProvisioned": true, "lastProvisioned": "t"},
        });
        let mut paths = leaf_paths(&patch);
        paths.sort();
        assert_eq!(
            paths,
            vec![
                "`provisioningStatus`",
                "`xero`.`lastProvisioned`",
                "`xero`.`resourcesProvisioned`",
            ]
        );
    }

    #[test]
    fn body_truncation_respects_char_boundaries() {
        // 'é' chars sit at odd byte offsets, so byte 512 is mid-character.
        let body = format!("a{}", "é".repeat(300));
        let truncated = truncated_body(body);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 515);

        let short = truncated_body("tiny".to_string());
        assert_eq!(short, "tiny");
    }

    #[test]
    fn job_id_truncates_user_id() {
        assert_eq!(
            CloudSchedulerJobs::job_id("abcdefghijklmnop"),
            "connector-sync-abcdefghijkl"
        );
        assert_eq!(CloudSchedulerJobs::job_id("u1"), "connector-sync-u1");
        // Multi-byte character straddling the truncation point.
        assert_eq!(
            CloudSchedulerJobs::job_id("abcdefghijké-rest"),
            "connector-sync-abcdefghijké"
        );
    }
}
