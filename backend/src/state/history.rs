use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use shared::{newest_first, HistoryRecord};

use super::lock;
use crate::db::{HistoryError, HistoryRepository};
use crate::storage::AssetStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRemoval {
    Removed,
    AlreadyAbsent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub records: Vec<HistoryRecord>,
    pub limit: usize,
    pub refreshed_at: Option<DateTime<Utc>>,
}

struct HistoryView {
    records: Vec<HistoryRecord>,
    limit: usize,
    refreshed_at: Option<DateTime<Utc>>,
    next_ticket: u64,
    published_ticket: u64,
}

/// Cached newest-first view of the history log.
pub struct HistoryState {
    repo: Arc<dyn HistoryRepository>,
    store: Option<Arc<dyn AssetStore>>,
    view: Mutex<HistoryView>,
}

impl HistoryState {
    pub fn new(repo: Arc<dyn HistoryRepository>, limit: usize) -> Self {
        Self {
            repo,
            store: None,
            view: Mutex::new(HistoryView {
                records: Vec::new(),
                limit,
                refreshed_at: None,
                next_ticket: 0,
                published_ticket: 0,
            }),
        }
    }

    /// Records that carry a storage key get their link from `store` on every
    /// refresh.
    pub fn with_asset_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Re-reads the log with the limit last asked for.
    pub async fn refresh_current(&self) -> Result<usize, HistoryError> {
        let limit = lock(&self.view).limit;
        self.refresh(limit).await
    }

    /// On failure the cached list stays as it was.
    pub async fn refresh(&self, limit: usize) -> Result<usize, HistoryError> {
        let ticket = {
            let mut view = lock(&self.view);
            view.next_ticket += 1;
            view.next_ticket
        };

        let records = self.repo.list(limit).await.map_err(|e| {
            warn!("History refresh failed, keeping cached list: {}", e);
            e
        })?;
        let records = self.relink(newest_first(records, limit)).await;
        let count = records.len();

        let mut view = lock(&self.view);
        if ticket <= view.published_ticket {
            debug!("Discarding history refresh #{} superseded by #{}", ticket, view.published_ticket);
            return Ok(view.records.len());
        }
        view.published_ticket = ticket;
        view.records = records;
        view.limit = limit;
        view.refreshed_at = Some(Utc::now());
        Ok(count)
    }

    /// A key that no longer resolves keeps the link it was saved with.
    async fn relink(&self, records: Vec<HistoryRecord>) -> Vec<HistoryRecord> {
        let Some(store) = &self.store else {
            return records;
        };
        join_all(records.into_iter().map(|mut record| async move {
            if let Some(key) = &record.storage_key {
                match store.resolve_url(key).await {
                    Ok(url) => record.image_url = url,
                    Err(e) => debug!("Keeping saved link for history record {}: {}", record.id, e),
                }
            }
            record
        }))
        .await
    }

    /// The local list only changes once the backend has confirmed the record
    /// is gone. A record the backend never had is dropped locally too.
    /// Refreshes already in flight may have listed the record, so they are
    /// superseded by the removal.
    pub async fn remove(&self, id: &str) -> Result<HistoryRemoval, HistoryError> {
        let removal = match self.repo.delete(id).await {
            Ok(()) => HistoryRemoval::Removed,
            Err(HistoryError::NotFound(_)) => {
                info!("History record {} was already gone", id);
                HistoryRemoval::AlreadyAbsent
            }
            Err(e) => {
                warn!("Could not delete history record {}: {}", id, e);
                return Err(e);
            }
        };

        let mut view = lock(&self.view);
        view.records.retain(|r| r.id != id);
        view.published_ticket = view.next_ticket;
        Ok(removal)
    }

    #[cfg(test)]
    pub fn records(&self) -> Vec<HistoryRecord> {
        lock(&self.view).records.clone()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let view = lock(&self.view);
        HistorySnapshot {
            records: view.records.clone(),
            limit: view.limit,
            refreshed_at: view.refreshed_at,
        }
    }
}
