use std::sync::{Arc, Mutex};

use actix_web::rt::task::JoinHandle;
use futures::future::join;
use log::{debug, error, info, warn};
use shared::{HistoryRecord, InferenceResult, Notification, RequestId, Severity, UploadPhase};

use super::{
    describe_history_failure, validate_image_url, validate_upload, AnalyzeError, ValidationError,
};
use crate::db::HistoryRepository;
use crate::inference::InferenceClient;
use crate::notify::Notifier;
use crate::state::gallery::GalleryState;
use crate::state::history::HistoryState;
use crate::state::lock;
use crate::state::session::{SelectedFile, SessionState};
use crate::storage::{AssetStore, UploadFile};

/// Runs one analysis at a time through upload, inference and history, and
/// keeps the gallery and history views in step with what it wrote.
pub struct Orchestrator {
    store: Arc<dyn AssetStore>,
    inference: Arc<dyn InferenceClient>,
    history_repo: Arc<dyn HistoryRepository>,
    gallery: Arc<GalleryState>,
    history: Arc<HistoryState>,
    session: Arc<SessionState>,
    notifier: Arc<dyn Notifier>,
    max_upload_bytes: usize,
    pending_refreshes: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn AssetStore>,
        inference: Arc<dyn InferenceClient>,
        history_repo: Arc<dyn HistoryRepository>,
        gallery: Arc<GalleryState>,
        history: Arc<HistoryState>,
        session: Arc<SessionState>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            inference,
            history_repo,
            gallery,
            history,
            session,
            notifier,
            max_upload_bytes: shared::MAX_UPLOAD_BYTES,
            pending_refreshes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Uploads the file, labels it and records the outcome. Nothing leaves
    /// the process when validation fails.
    pub async fn analyze(&self, file: Option<UploadFile>) -> Result<InferenceResult, AnalyzeError> {
        let selected = file.as_ref().map(SelectedFile::from);
        let file = match validate_upload(file, self.max_upload_bytes) {
            Ok(file) => file,
            Err(e) => return Err(self.reject_upload(selected, e)),
        };

        let id = self.session.begin(selected, None);
        info!("[{}] Uploading {} ({} bytes)", id, file.name, file.bytes.len());

        let asset = match self.store.put(&file).await {
            Ok(asset) => asset,
            Err(e) => return Err(self.fail(id, e.into())),
        };
        debug!("[{}] Stored as {}", id, asset.storage_key);
        self.session.set_preview(id, &asset.public_url);
        self.session.advance(id, UploadPhase::Inferring);

        match self
            .infer_and_persist(id, &asset.public_url, Some(&asset.storage_key))
            .await
        {
            Ok(result) => {
                self.refresh_in_background(true);
                Ok(result)
            }
            Err(e) => {
                // The image is stored even though labelling failed.
                self.refresh_in_background(true);
                Err(e)
            }
        }
    }

    /// Labels an image that is already reachable over http(s). Storage is
    /// skipped, so only the history view is refreshed afterwards.
    pub async fn analyze_url(&self, raw_url: &str) -> Result<InferenceResult, AnalyzeError> {
        let url = match validate_image_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Rejected URL: {}", e);
                self.session.reject(None, e.to_string());
                self.notifier.notify(Notification::new(e.to_string(), Severity::Warning));
                return Err(e.into());
            }
        };

        let id = self.session.begin(None, Some(url.to_string()));
        info!("[{}] Analysing {}", id, url);
        self.session.set_preview(id, url.as_str());
        self.session.advance(id, UploadPhase::Inferring);

        let result = self.infer_and_persist(id, url.as_str(), None).await?;
        self.refresh_in_background(false);
        Ok(result)
    }

    /// Records an upload turned away before anything left the process,
    /// including one cut off while it was still being received.
    pub fn reject_upload(
        &self,
        selected: Option<SelectedFile>,
        err: ValidationError,
    ) -> AnalyzeError {
        warn!("Rejected upload: {}", err);
        self.session.reject(selected, err.to_string());
        self.notifier
            .notify(Notification::new(err.to_string(), Severity::Warning));
        err.into()
    }

    async fn infer_and_persist(
        &self,
        id: RequestId,
        image_url: &str,
        storage_key: Option<&str>,
    ) -> Result<InferenceResult, AnalyzeError> {
        let result = match self.inference.submit(image_url).await {
            Ok(result) => result,
            Err(e) => return Err(self.fail(id, e.into())),
        };
        self.session.advance(id, UploadPhase::Persisting);

        let mut record = HistoryRecord::from_result(&result);
        record.storage_key = storage_key.map(str::to_string);
        match self.history_repo.append(&record).await {
            Ok(record_id) => debug!("[{}] History record {} written", id, record_id),
            Err(e) => warn!(
                "[{}] Result not saved to history: {}",
                id,
                describe_history_failure(&e)
            ),
        }

        if self.session.complete(id, &result) {
            let summary = match result.top_label() {
                Some(label) => format!("{} ({:.2}%)", label.name, label.percentage),
                None => shared::UNLABELED.to_string(),
            };
            self.notifier.notify(Notification::new(
                format!("Analysis complete: {}", summary),
                Severity::Success,
            ));
        } else {
            info!("[{}] Finished after being superseded; result not published", id);
        }
        Ok(result)
    }

    fn fail(&self, id: RequestId, err: AnalyzeError) -> AnalyzeError {
        if self.session.fail(id, err.user_message()) {
            error!("[{}] {} failed: {}", id, err.stage(), err);
            self.notifier
                .notify(Notification::new(err.user_message(), Severity::Error));
        } else {
            info!("[{}] Superseded request failed: {}", id, err);
        }
        err
    }

    /// Re-reads the views without blocking the caller. Failures only log.
    pub fn refresh_in_background(&self, include_gallery: bool) {
        let gallery = include_gallery.then(|| self.gallery.clone());
        let history = self.history.clone();

        let handle = actix_web::rt::spawn(async move {
            let refresh_gallery = async move {
                if let Some(gallery) = gallery {
                    match gallery.refresh().await {
                        Ok(report) if !report.failed.is_empty() => warn!(
                            "Gallery refreshed with {} of {} images",
                            report.resolved,
                            report.resolved + report.failed.len()
                        ),
                        Ok(_) => {}
                        Err(e) => warn!("Gallery refresh failed: {}", e),
                    }
                }
            };
            let refresh_history = async move {
                if let Err(e) = history.refresh_current().await {
                    warn!("History refresh failed: {}", e);
                }
            };
            join(refresh_gallery, refresh_history).await;
        });

        let mut pending = lock(&self.pending_refreshes);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Waits for every background refresh started so far.
    pub async fn settle(&self) {
        let handles = std::mem::take(&mut *lock(&self.pending_refreshes));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Background refresh did not finish: {}", e);
            }
        }
    }
}
