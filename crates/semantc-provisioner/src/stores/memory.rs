// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory store implementations for testing.
//!
//! `MemoryStatusStore` records every merge in order, which is what the
//! state-machine ordering tests assert against.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{AccountService, BlobStore, JobScheduler, Result, StatusStore, StoreError};
use crate::status::ConnectorRecord;

/// Recursively merge `patch` onto `base`, replacing non-object leaves.
fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                deep_merge(base_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// In-memory status store with merge-write semantics.
#[derive(Default)]
pub struct MemoryStatusStore {
    records: Mutex<HashMap<String, Value>>,
    writes: Mutex<Vec<(String, Value)>>,
    fail_merges: bool,
}

impl MemoryStatusStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose merges all fail, for status-write error paths.
    pub fn failing() -> Self {
        Self {
            fail_merges: true,
            ..Self::default()
        }
    }

    /// Seed a connector record for a user.
    pub fn seed(&self, user_id: &str, record: Value) {
        self.records
            .lock()
            .unwrap()
            .insert(user_id.to_string(), record);
    }

    /// Every merge performed, in write order.
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().unwrap().clone()
    }

    /// Current document for a user.
    pub fn document(&self, user_id: &str) -> Option<Value> {
        self.records.lock().unwrap().get(user_id).cloned()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get(&self, user_id: &str) -> Result<Option<ConnectorRecord>> {
        let records = self.records.lock().unwrap();
        match records.get(user_id) {
            Some(doc) => Ok(Some(serde_json::from_value(doc.clone())?)),
            None => Ok(None),
        }
    }

    async fn merge(&self, user_id: &str, patch: Value) -> Result<()> {
        if self.fail_merges {
            return Err(StoreError::Other("simulated merge failure".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let doc = records
            .entry(user_id.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        deep_merge(doc, &patch);
        self.writes
            .lock()
            .unwrap()
            .push((user_id.to_string(), patch));
        Ok(())
    }
}

/// In-memory blob store seeded with named objects.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    unreachable: bool,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose listing always fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Insert an object.
    pub fn insert(&self, name: &str, content: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(name.to_string(), content.to_vec());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list(&self, _bucket: &str) -> Result<Vec<String>> {
        if self.unreachable {
            return Err(StoreError::Other("bucket unreachable".to_string()));
        }
        let mut names: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn fetch(&self, _bucket: &str, name: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::Other(format!("no such object: {name}")))
    }
}

/// Account service that records delete calls.
#[derive(Default)]
pub struct RecordingAccountService {
    deletes: Mutex<Vec<String>>,
    fail_deletes: bool,
}

impl RecordingAccountService {
    /// Create a recording service whose deletes succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recording service whose deletes fail (account absent).
    pub fn failing() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    /// Emails passed to `delete_service_account`, in call order.
    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountService for RecordingAccountService {
    async fn delete_service_account(&self, email: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(email.to_string());
        if self.fail_deletes {
            return Err(StoreError::Other("account does not exist".to_string()));
        }
        Ok(())
    }
}

/// Job scheduler that records registrations.
#[derive(Default)]
pub struct RecordingScheduler {
    jobs: Mutex<Vec<(String, String)>>,
    fail_registrations: bool,
}

impl RecordingScheduler {
    /// Create a recording scheduler whose registrations succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recording scheduler whose registrations fail.
    pub fn failing() -> Self {
        Self {
            fail_registrations: true,
            ..Self::default()
        }
    }

    /// (user_id, connector_type) pairs registered, in call order.
    pub fn jobs(&self) -> Vec<(String, String)> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobScheduler for RecordingScheduler {
    async fn ensure_sync_job(&self, user_id: &str, connector_type: &str) -> Result<()> {
        self.jobs
            .lock()
            .unwrap()
            .push((user_id.to_string(), connector_type.to_string()));
        if self.fail_registrations {
            return Err(StoreError::Other("scheduler unavailable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn merge_preserves_unpatched_fields() {
        let store = MemoryStatusStore::new();
        store.seed("u1", json!({"xero": {"active": true}, "other": 1}));

        store
            .merge("u1", json!({"xero": {"resourcesProvisioned": true}}))
            .await
            .unwrap();

        let doc = store.document("u1").unwrap();
        assert_eq!(doc["xero"]["active"], json!(true));
        assert_eq!(doc["xero"]["resourcesProvisioned"], json!(true));
        assert_eq!(doc["other"], json!(1));
    }

    #[tokio::test]
    async fn writes_are_recorded_in_order() {
        let store = MemoryStatusStore::new();
        store.merge("u1", json!({"a": 1})).await.unwrap();
        store.merge("u1", json!({"b": 2})).await.unwrap();

        let writes = store.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].1, json!({"a": 1}));
        assert_eq!(writes[1].1, json!({"b": 2}));
    }

    #[tokio::test]
    async fn empty_blob_store_lists_nothing() {
        let store = MemoryBlobStore::new();
        assert!(store.list("bucket").await.unwrap().is_empty());
    }
}
