use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::AsRefStr;
use uuid::Uuid;

pub mod wire;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const UNLABELED: &str = "unlabeled";

/// A stored image as shown in the gallery, with its URL already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub storage_key: String,
    pub public_url: String,
    pub display_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// An object listed by the asset store before its URL has been resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAsset {
    pub storage_key: String,
    pub display_name: String,
    pub uploaded_at: DateTime<Utc>,
}

impl StoredAsset {
    pub fn resolved(self, public_url: String) -> ImageAsset {
        ImageAsset {
            storage_key: self.storage_key,
            public_url,
            display_name: self.display_name,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub score: f32,
    pub percentage: f32,
}

impl Label {
    /// Builds a label from raw model output. Returns `None` for a non-finite
    /// score; out-of-range scores are clamped into `[0, 1]`.
    pub fn new(name: impl Into<String>, score: f32, percentage: Option<f32>) -> Option<Self> {
        if !score.is_finite() {
            return None;
        }
        let score = score.clamp(0.0, 1.0);
        let percentage = match percentage {
            Some(p) if p.is_finite() => p.clamp(0.0, 100.0),
            _ => (score * 10_000.0).round() / 100.0,
        };
        Some(Self {
            name: name.into(),
            score,
            percentage,
        })
    }
}

/// Outcome of one successful inference call. Labels are kept in descending
/// score order, so the only way in is [`InferenceResult::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    pub source_url: String,
    labels: Vec<Label>,
    pub model_name: String,
    pub processing_time_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

impl InferenceResult {
    pub fn new(
        source_url: String,
        mut labels: Vec<Label>,
        model_name: String,
        processing_time_seconds: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        labels.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self {
            source_url,
            labels,
            model_name,
            processing_time_seconds,
            timestamp,
        }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn top_label(&self) -> Option<&Label> {
        self.labels.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub image_url: String,
    pub top_label: String,
    pub top_confidence_percentage: f32,
    pub model_name: String,
    pub processing_time_seconds: f64,
    pub timestamp: DateTime<Utc>,
    /// Present when the image lives in the asset store. Readers resolve a
    /// fresh link from it instead of trusting `image_url`, which may be a
    /// signed URL that has since expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

impl HistoryRecord {
    pub fn from_result(result: &InferenceResult) -> Self {
        let (top_label, top_confidence_percentage) = match result.top_label() {
            Some(label) => (label.name.clone(), label.percentage),
            None => (UNLABELED.to_string(), 0.0),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            image_url: result.source_url.clone(),
            top_label,
            top_confidence_percentage,
            model_name: result.model_name.clone(),
            processing_time_seconds: result.processing_time_seconds,
            timestamp: result.timestamp,
            storage_key: None,
        }
    }
}

/// Orders records newest-first and drops everything past `limit`.
pub fn newest_first(mut records: Vec<HistoryRecord>, limit: usize) -> Vec<HistoryRecord> {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records.truncate(limit);
    records
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UploadPhase {
    #[default]
    Idle,
    Uploading,
    Inferring,
    Persisting,
    Done,
    Failed,
}

impl UploadPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadPhase::Done | UploadPhase::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            UploadPhase::Idle => 0,
            UploadPhase::Uploading => 1,
            UploadPhase::Inferring => 2,
            UploadPhase::Persisting => 3,
            UploadPhase::Done => 4,
            UploadPhase::Failed => 4,
        }
    }

    /// Forward moves along the pipeline, or a diversion to `Failed` from a
    /// running phase. Returning to `Idle` goes through an explicit reset.
    pub fn can_advance_to(self, next: UploadPhase) -> bool {
        match (self, next) {
            (UploadPhase::Idle, UploadPhase::Uploading) => true,
            (UploadPhase::Done | UploadPhase::Failed, _) => false,
            (UploadPhase::Idle, _) => false,
            (_, UploadPhase::Failed) => true,
            (_, UploadPhase::Idle) => false,
            (current, next) => next.rank() == current.rank() + 1,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unreachable,
}

/// Banner shown from the inference service's health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub status: ServiceStatus,
    pub model_name: Option<String>,
    pub checked_at: DateTime<Utc>,
}
