use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};
use shared::{InferenceResult, RequestId, UploadPhase};

use super::lock;
use crate::storage::UploadFile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub size: usize,
}

impl From<&UploadFile> for SelectedFile {
    fn from(file: &UploadFile) -> Self {
        Self {
            name: file.name.clone(),
            content_type: file.content_type.clone(),
            size: file.bytes.len(),
        }
    }
}

/// What the user sees of the current analysis attempt.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub request_id: Option<RequestId>,
    pub selected_file: Option<SelectedFile>,
    pub preview_url: Option<String>,
    pub analysed_url: Option<String>,
    pub phase: UploadPhase,
    pub last_error: Option<String>,
    pub latest_result: Option<InferenceResult>,
}

impl UploadSession {
    pub fn is_running(&self) -> bool {
        !self.phase.is_terminal() && self.phase != UploadPhase::Idle
    }
}

/// Owns the single upload session. Every mutation coming from an in-flight
/// request carries that request's id and is dropped once a newer request has
/// started.
#[derive(Default)]
pub struct SessionState {
    inner: Mutex<UploadSession>,
    last_id: Mutex<u64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UploadSession {
        lock(&self.inner).clone()
    }

    /// Starts a new attempt in `Uploading`, superseding any earlier one.
    /// The latest result is kept until the new attempt completes.
    pub fn begin(&self, file: Option<SelectedFile>, analysed_url: Option<String>) -> RequestId {
        let id = {
            let mut last = lock(&self.last_id);
            *last += 1;
            RequestId(*last)
        };

        let mut session = lock(&self.inner);
        if session.is_running() {
            debug!(
                "Request {} supersedes {:?} in phase {}",
                id, session.request_id, session.phase
            );
        }
        let latest_result = session.latest_result.take();
        *session = UploadSession {
            request_id: Some(id),
            selected_file: file,
            preview_url: None,
            analysed_url,
            phase: UploadPhase::Uploading,
            last_error: None,
            latest_result,
        };
        id
    }

    pub fn advance(&self, id: RequestId, phase: UploadPhase) -> bool {
        let mut session = lock(&self.inner);
        if session.request_id != Some(id) || !session.phase.can_advance_to(phase) {
            debug!("Ignoring {} -> {} for stale or finished request {}", session.phase, phase, id);
            return false;
        }
        session.phase = phase;
        true
    }

    pub fn set_preview(&self, id: RequestId, url: &str) -> bool {
        let mut session = lock(&self.inner);
        if session.request_id != Some(id) {
            return false;
        }
        session.preview_url = Some(url.to_string());
        if session.analysed_url.is_none() {
            session.analysed_url = Some(url.to_string());
        }
        true
    }

    pub fn fail(&self, id: RequestId, error: impl Into<String>) -> bool {
        let mut session = lock(&self.inner);
        if session.request_id != Some(id) || !session.phase.can_advance_to(UploadPhase::Failed) {
            return false;
        }
        session.phase = UploadPhase::Failed;
        session.last_error = Some(error.into());
        true
    }

    /// Publishes the result only for the current request in `Persisting`.
    pub fn complete(&self, id: RequestId, result: &InferenceResult) -> bool {
        let mut session = lock(&self.inner);
        if session.request_id != Some(id) || !session.phase.can_advance_to(UploadPhase::Done) {
            return false;
        }
        session.phase = UploadPhase::Done;
        session.last_error = None;
        session.latest_result = Some(result.clone());
        true
    }

    /// Input rejected before any remote call. A running attempt is left
    /// alone; otherwise the error is shown against an idle session.
    pub fn reject(&self, file: Option<SelectedFile>, error: impl Into<String>) {
        let mut session = lock(&self.inner);
        if session.is_running() {
            return;
        }
        session.phase = UploadPhase::Idle;
        session.request_id = None;
        session.selected_file = file;
        session.preview_url = None;
        session.analysed_url = None;
        session.last_error = Some(error.into());
    }

    /// Records the user's pick. Outside a running attempt this also clears
    /// the previous outcome and returns the session to `Idle`.
    pub fn select(&self, file: SelectedFile) {
        let mut session = lock(&self.inner);
        if session.is_running() {
            session.selected_file = Some(file);
            return;
        }
        *session = UploadSession {
            selected_file: Some(file),
            latest_result: session.latest_result.take(),
            ..UploadSession::default()
        };
    }

    /// Back to `Idle`. Refused while an attempt is running.
    pub fn reset(&self) -> bool {
        let mut session = lock(&self.inner);
        if session.is_running() {
            return false;
        }
        *session = UploadSession::default();
        true
    }
}
