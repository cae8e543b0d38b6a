pub mod s3_service;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{ImageAsset, StoredAsset};

use crate::state::lock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Network failure: {0}")]
    NetworkFailure(String),
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Asset not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// An image handed to the pipeline by the user.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Object store holding the uploaded images. Listing, writes and deletes
/// always reach the backing store. A resolved URL may be handed out again
/// for as long as it stays valid.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn put(&self, file: &UploadFile) -> Result<ImageAsset, StorageError>;

    async fn resolve_url(&self, storage_key: &str) -> Result<String, StorageError>;

    /// Entries come back in whatever order the backing store lists them.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredAsset>, StorageError>;

    async fn delete(&self, storage_key: &str) -> Result<(), StorageError>;
}

/// Hands out strictly increasing millisecond stamps so that keys generated
/// within one process sort chronologically.
#[derive(Debug, Default)]
pub struct KeyClock {
    last_millis: AtomicI64,
}

impl KeyClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_millis(&self, now_millis: i64) -> i64 {
        let mut last = self.last_millis.load(Ordering::SeqCst);
        loop {
            let next = now_millis.max(last + 1);
            match self
                .last_millis
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    pub fn next_key(&self, prefix: &str, file_name: &str) -> String {
        let millis = self.next_millis(Utc::now().timestamp_millis());
        storage_key(prefix, millis, file_name)
    }
}

struct PresignedUrl {
    url: String,
    renew_after: DateTime<Utc>,
}

/// Signed links per storage key. A link is reused until half of its lifetime
/// has passed, so resolving the same key twice yields the same URL.
#[derive(Default)]
pub struct PresignedUrls {
    entries: Mutex<HashMap<String, PresignedUrl>>,
}

impl PresignedUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, storage_key: &str, now: DateTime<Utc>) -> Option<String> {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get(storage_key) {
            if now < entry.renew_after {
                return Some(entry.url.clone());
            }
        }
        entries.remove(storage_key);
        None
    }

    pub fn insert(&self, storage_key: &str, url: String, signed_at: DateTime<Utc>, ttl: Duration) {
        let half_life =
            chrono::Duration::from_std(ttl / 2).unwrap_or_else(|_| chrono::Duration::zero());
        lock(&self.entries).insert(
            storage_key.to_string(),
            PresignedUrl {
                url,
                renew_after: signed_at + half_life,
            },
        );
    }

    pub fn forget(&self, storage_key: &str) {
        lock(&self.entries).remove(storage_key);
    }
}

pub fn storage_key(prefix: &str, millis: i64, file_name: &str) -> String {
    format!("{}{}-{}", prefix, millis, sanitize_file_name(file_name))
}

pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(['.', '_']).is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// Recovers the user-facing file name from a key built by [`storage_key`].
pub fn display_name_from_key(storage_key: &str) -> String {
    let file = storage_key.rsplit('/').next().unwrap_or(storage_key);
    match file.split_once('-') {
        Some((stamp, rest))
            if !stamp.is_empty() && !rest.is_empty() && stamp.chars().all(|c| c.is_ascii_digit()) =>
        {
            rest.to_string()
        }
        _ => file.to_string(),
    }
}
