use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use shared::{ImageAsset, StoredAsset};

use super::carousel::Carousel;
use super::lock;
use crate::notify::Confirmation;
use crate::storage::{AssetStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("None of the {0} stored images could be resolved")]
    NothingResolved(usize),
    #[error("No image is open in the viewer")]
    NothingSelected,
    #[error("The selected image changed before the deletion was confirmed")]
    SelectionChanged,
}

#[derive(Debug, Default)]
pub struct RefreshReport {
    pub resolved: usize,
    pub failed: Vec<(String, StorageError)>,
    pub published: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    Deleted,
    AlreadyAbsent,
    Declined,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselView {
    pub is_open: bool,
    pub current_index: Option<usize>,
    pub position: Option<String>,
    pub asset: Option<ImageAsset>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GallerySnapshot {
    pub assets: Vec<ImageAsset>,
    pub carousel: CarouselView,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct GalleryView {
    assets: Vec<ImageAsset>,
    carousel: Carousel,
    refreshed_at: Option<DateTime<Utc>>,
    next_ticket: u64,
    published_ticket: u64,
}

impl GalleryView {
    fn carousel_view(&self) -> CarouselView {
        let current_index = self.carousel.current_index();
        CarouselView {
            is_open: self.carousel.is_open(),
            current_index,
            position: current_index.map(|i| format!("{} / {}", i + 1, self.assets.len())),
            asset: current_index.and_then(|i| self.assets.get(i).cloned()),
        }
    }

    fn current_key(&self) -> Option<&str> {
        self.carousel
            .current_index()
            .and_then(|i| self.assets.get(i))
            .map(|a| a.storage_key.as_str())
    }

    fn set_assets(&mut self, assets: Vec<ImageAsset>) {
        self.assets = assets;
        self.carousel.reconcile(self.assets.len());
    }
}

/// Cached, URL-resolved projection of the asset store plus the viewer cursor
/// over it. The carousel lives under the same lock so every list change
/// re-clamps it atomically.
pub struct GalleryState {
    store: Arc<dyn AssetStore>,
    prefix: String,
    view: Mutex<GalleryView>,
}

impl GalleryState {
    pub fn new(store: Arc<dyn AssetStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            view: Mutex::new(GalleryView::default()),
        }
    }

    /// Lists the store and resolves every entry concurrently. Entries that
    /// fail to resolve are left out and reported; the cache is only kept as-is
    /// when the listing fails or nothing at all resolves.
    pub async fn refresh(&self) -> Result<RefreshReport, GalleryError> {
        let ticket = {
            let mut view = lock(&self.view);
            view.next_ticket += 1;
            view.next_ticket
        };

        let listed = self.store.list(&self.prefix).await.map_err(|e| {
            warn!("Gallery listing failed, keeping cached list: {}", e);
            e
        })?;
        let listed = dedupe(listed);
        let total = listed.len();

        let resolutions = join_all(listed.into_iter().map(|entry| async move {
            match self.store.resolve_url(&entry.storage_key).await {
                Ok(url) => Ok(entry.resolved(url)),
                Err(e) => Err((entry.storage_key, e)),
            }
        }))
        .await;

        let mut report = RefreshReport::default();
        let mut assets = Vec::with_capacity(total);
        for resolution in resolutions {
            match resolution {
                Ok(asset) => assets.push(asset),
                Err((key, e)) => {
                    warn!("Could not resolve URL for {}: {}", key, e);
                    report.failed.push((key, e));
                }
            }
        }
        report.resolved = assets.len();

        if total > 0 && assets.is_empty() {
            return Err(GalleryError::NothingResolved(total));
        }

        let mut view = lock(&self.view);
        if ticket <= view.published_ticket {
            debug!("Discarding gallery refresh #{} superseded by #{}", ticket, view.published_ticket);
            return Ok(report);
        }
        view.published_ticket = ticket;
        view.set_assets(assets);
        view.refreshed_at = Some(Utc::now());
        report.published = true;
        Ok(report)
    }

    /// Deletes from the store, drops the entry locally and refreshes. A key
    /// the store no longer has counts as already deleted. Refreshes that were
    /// already listing when the delete landed are superseded.
    pub async fn remove(&self, storage_key: &str) -> Result<RemoveOutcome, GalleryError> {
        let outcome = match self.store.delete(storage_key).await {
            Ok(()) => RemoveOutcome::Deleted,
            Err(StorageError::NotFound(_)) => {
                info!("{} was already gone from the store", storage_key);
                RemoveOutcome::AlreadyAbsent
            }
            Err(e) => return Err(e.into()),
        };

        {
            let mut view = lock(&self.view);
            let remaining: Vec<ImageAsset> = view
                .assets
                .iter()
                .filter(|a| a.storage_key != storage_key)
                .cloned()
                .collect();
            view.set_assets(remaining);
            view.published_ticket = view.next_ticket;
        }

        if let Err(e) = self.refresh().await {
            warn!("Gallery refresh after deleting {} failed: {}", storage_key, e);
        }
        Ok(outcome)
    }

    /// Deletes the image under the viewer cursor once the user confirms.
    pub async fn delete_current(
        &self,
        confirmation: &dyn Confirmation,
    ) -> Result<RemoveOutcome, GalleryError> {
        let key = lock(&self.view)
            .current_key()
            .map(str::to_string)
            .ok_or(GalleryError::NothingSelected)?;

        let prompt = format!("Delete {}?", key);
        if !confirmation.confirm(&prompt).await {
            return Ok(RemoveOutcome::Declined);
        }

        if lock(&self.view).current_key() != Some(key.as_str()) {
            return Err(GalleryError::SelectionChanged);
        }

        self.remove(&key).await
    }

    #[cfg(test)]
    pub fn assets(&self) -> Vec<ImageAsset> {
        lock(&self.view).assets.clone()
    }

    pub fn snapshot(&self) -> GallerySnapshot {
        let view = lock(&self.view);
        GallerySnapshot {
            assets: view.assets.clone(),
            carousel: view.carousel_view(),
            refreshed_at: view.refreshed_at,
        }
    }

    pub fn carousel(&self) -> CarouselView {
        lock(&self.view).carousel_view()
    }

    pub fn open(&self, index: usize) -> bool {
        let mut view = lock(&self.view);
        let len = view.assets.len();
        view.carousel.open(index, len)
    }

    pub fn next(&self) -> CarouselView {
        let mut view = lock(&self.view);
        let len = view.assets.len();
        view.carousel.next(len);
        view.carousel_view()
    }

    pub fn prev(&self) -> CarouselView {
        let mut view = lock(&self.view);
        let len = view.assets.len();
        view.carousel.prev(len);
        view.carousel_view()
    }

    pub fn close(&self) -> CarouselView {
        let mut view = lock(&self.view);
        view.carousel.close();
        view.carousel_view()
    }
}

fn dedupe(listed: Vec<StoredAsset>) -> Vec<StoredAsset> {
    let mut seen = HashSet::new();
    listed
        .into_iter()
        .filter(|entry| seen.insert(entry.storage_key.clone()))
        .collect()
}
