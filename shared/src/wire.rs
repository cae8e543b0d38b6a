//! Request and response shapes of the remote inference and history services.
//!
//! The inference service answers with a `status` discriminator; older
//! deployments used Spanish field names, which are accepted as aliases.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::HistoryRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InferenceResponse {
    Success(InferenceSuccess),
    Error(InferenceFailure),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceSuccess {
    #[serde(alias = "etiquetas")]
    pub labels: Vec<WireLabel>,
    #[serde(alias = "modelo", default)]
    pub model: String,
    #[serde(alias = "tiempo_procesamiento", alias = "processing_time_seconds", default)]
    pub processing_time_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireLabel {
    #[serde(alias = "name")]
    pub label: String,
    pub score: f32,
    #[serde(default)]
    pub percentage: Option<f32>,
}

/// A domain error reported by the service with a 2xx status.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceFailure {
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub solution: Option<String>,
}

pub const DEPENDENCIES_MISSING: &str = "dependencies_missing";

/// Body of a non-2xx response. `detail` may be a string or a structured
/// validation report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TransportErrorBody {
    pub fn describe(&self) -> Option<String> {
        match (&self.detail, &self.message) {
            (Some(Value::String(detail)), _) => Some(detail.clone()),
            (Some(Value::Null) | None, Some(message)) => Some(message.clone()),
            (Some(other), _) => Some(other.to_string()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, alias = "model", alias = "model_name")]
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryListResponse {
    pub status: String,
    #[serde(default)]
    pub records: Vec<HistoryRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryAppendResponse {
    pub status: String,
    pub id: String,
}
