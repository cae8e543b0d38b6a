//! In-memory collaborators for unit and route tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use futures::channel::oneshot;
use shared::{
    HistoryRecord, ImageAsset, InferenceResult, Label, ServiceStatus, StoredAsset, SystemStatus,
};

use crate::db::{HistoryError, HistoryRepository};
use crate::inference::{InferenceClient, InferenceError};
use crate::state::lock;
use crate::storage::{display_name_from_key, AssetStore, KeyClock, StorageError, UploadFile};

pub const PREFIX: &str = "images/";
pub const CDN: &str = "https://cdn.test/";

pub fn upload(name: &str, size: usize) -> UploadFile {
    UploadFile {
        name: name.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xFF; size],
    }
}

pub fn record_at(id: &str, offset_secs: i64) -> HistoryRecord {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    HistoryRecord {
        id: id.to_string(),
        image_url: format!("{}{}.jpg", CDN, id),
        top_label: "cat".to_string(),
        top_confidence_percentage: 90.0,
        model_name: "vit".to_string(),
        processing_time_seconds: 0.4,
        timestamp: base + Duration::seconds(offset_secs),
        storage_key: None,
    }
}

#[derive(Default)]
pub struct FakeAssetStore {
    entries: Mutex<Vec<StoredAsset>>,
    unresolvable: Mutex<HashSet<String>>,
    duplicated: Mutex<Vec<String>>,
    put_failure: Mutex<Option<StorageError>>,
    listing_fails: AtomicBool,
    listing_gate: Mutex<Option<oneshot::Receiver<()>>>,
    clock: KeyClock,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl FakeAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listed_keys(&self) -> Vec<String> {
        lock(&self.entries)
            .iter()
            .map(|e| e.storage_key.clone())
            .collect()
    }

    pub fn fail_resolution_for(&self, key: &str) {
        lock(&self.unresolvable).insert(key.to_string());
    }

    pub fn fail_listing(&self, fail: bool) {
        self.listing_fails.store(fail, Ordering::SeqCst);
    }

    /// Holds the next listing, after it has read the entries, until the
    /// returned sender fires.
    pub fn hold_next_listing(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.listing_gate) = Some(rx);
        tx
    }

    pub fn fail_puts_with(&self, error: StorageError) {
        *lock(&self.put_failure) = Some(error);
    }

    pub fn duplicate_listing_of(&self, key: &str) {
        lock(&self.duplicated).push(key.to_string());
    }

    pub fn remove_behind_the_scenes(&self, key: &str) {
        lock(&self.entries).retain(|e| e.storage_key != key);
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetStore for FakeAssetStore {
    async fn put(&self, file: &UploadFile) -> Result<ImageAsset, StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.put_failure).clone() {
            return Err(error);
        }
        let key = self.clock.next_key(PREFIX, &file.name);
        let stored = StoredAsset {
            storage_key: key.clone(),
            display_name: display_name_from_key(&key),
            uploaded_at: Utc::now(),
        };
        lock(&self.entries).push(stored.clone());
        Ok(stored.resolved(format!("{}{}", CDN, key)))
    }

    async fn resolve_url(&self, storage_key: &str) -> Result<String, StorageError> {
        if lock(&self.unresolvable).contains(storage_key) {
            return Err(StorageError::Other(format!("cannot sign {}", storage_key)));
        }
        // Like presigning, resolution never checks that the object exists.
        Ok(format!("{}{}", CDN, storage_key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredAsset>, StorageError> {
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(StorageError::NetworkFailure("listing unavailable".into()));
        }
        let listed = {
            let entries = lock(&self.entries);
            let mut listed: Vec<StoredAsset> = entries
                .iter()
                .filter(|e| e.storage_key.starts_with(prefix))
                .cloned()
                .collect();
            for key in lock(&self.duplicated).iter() {
                if let Some(entry) = entries.iter().find(|e| &e.storage_key == key) {
                    listed.push(entry.clone());
                }
            }
            listed
        };
        let gate = lock(&self.listing_gate).take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(listed)
    }

    async fn delete(&self, storage_key: &str) -> Result<(), StorageError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|e| e.storage_key != storage_key);
        if entries.len() == before {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }
        Ok(())
    }
}

/// Answers every submission with the configured labels or error. A gate, when
/// installed, holds the next submission until it is released.
pub struct FakeInference {
    labels: Mutex<Vec<(String, f32)>>,
    failure: Mutex<Option<InferenceError>>,
    health_failure: Mutex<Option<InferenceError>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    submitted: Mutex<Vec<String>>,
}

impl FakeInference {
    pub fn labelling(labels: &[(&str, f32)]) -> Self {
        Self {
            labels: Mutex::new(labels.iter().map(|(n, s)| (n.to_string(), *s)).collect()),
            failure: Mutex::new(None),
            health_failure: Mutex::new(None),
            gate: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_with(&self, error: InferenceError) {
        *lock(&self.failure) = Some(error);
    }

    pub fn fail_health_with(&self, error: InferenceError) {
        *lock(&self.health_failure) = Some(error);
    }

    pub fn relabel(&self, labels: &[(&str, f32)]) {
        *lock(&self.labels) = labels.iter().map(|(n, s)| (n.to_string(), *s)).collect();
    }

    /// Holds the next submission until the returned sender fires.
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.gate) = Some(rx);
        tx
    }

    pub fn submitted(&self) -> Vec<String> {
        lock(&self.submitted).clone()
    }
}

#[async_trait]
impl InferenceClient for FakeInference {
    async fn submit(&self, image_url: &str) -> Result<InferenceResult, InferenceError> {
        let call = {
            let mut submitted = lock(&self.submitted);
            submitted.push(image_url.to_string());
            submitted.len() as i64
        };
        let gate = lock(&self.gate).take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }
        let labels = lock(&self.labels)
            .iter()
            .filter_map(|(name, score)| Label::new(name.clone(), *score, None))
            .collect();
        Ok(InferenceResult::new(
            image_url.to_string(),
            labels,
            "fake-vit".to_string(),
            0.42,
            Utc::now() + Duration::milliseconds(call),
        ))
    }

    async fn health(&self) -> Result<SystemStatus, InferenceError> {
        if let Some(error) = lock(&self.health_failure).clone() {
            return Err(error);
        }
        Ok(SystemStatus {
            status: ServiceStatus::Healthy,
            model_name: Some("fake-vit".to_string()),
            checked_at: Utc::now(),
        })
    }
}

#[derive(Default)]
pub struct FakeHistory {
    records: Mutex<Vec<HistoryRecord>>,
    append_fails: AtomicBool,
    listing_fails: AtomicBool,
    listing_gate: Mutex<Option<oneshot::Receiver<()>>>,
    delete_disabled: AtomicBool,
    append_calls: AtomicUsize,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self, fail: bool) {
        self.append_fails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.listing_fails.store(fail, Ordering::SeqCst);
    }

    /// Holds the next listing, after it has read the log, until the returned
    /// sender fires.
    pub fn hold_next_listing(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.listing_gate) = Some(rx);
        tx
    }

    pub fn disable_delete(&self) {
        self.delete_disabled.store(true, Ordering::SeqCst);
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    pub fn ids(&self) -> Vec<String> {
        lock(&self.records).iter().map(|r| r.id.clone()).collect()
    }

    pub fn stored(&self) -> Vec<HistoryRecord> {
        lock(&self.records).clone()
    }
}

#[async_trait]
impl HistoryRepository for FakeHistory {
    async fn append(&self, record: &HistoryRecord) -> Result<String, HistoryError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.append_fails.load(Ordering::SeqCst) {
            return Err(HistoryError::Backend("history table unavailable".into()));
        }
        lock(&self.records).push(record.clone());
        Ok(record.id.clone())
    }

    async fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>, HistoryError> {
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(HistoryError::Backend("history table unavailable".into()));
        }
        let listed = shared::newest_first(lock(&self.records).clone(), limit);
        let gate = lock(&self.listing_gate).take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(listed)
    }

    async fn delete(&self, id: &str) -> Result<(), HistoryError> {
        if self.delete_disabled.load(Ordering::SeqCst) {
            return Err(HistoryError::DeleteUnsupported);
        }
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(HistoryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
