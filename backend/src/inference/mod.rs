pub mod http_client;

use async_trait::async_trait;
use chrono::Utc;
use shared::{InferenceResult, ServiceStatus, SystemStatus};

pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const HEALTH_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("Inference service unreachable: {0}")]
    Unreachable(String),
    #[error("Inference timed out after {0} ms")]
    Timeout(u64),
    #[error("Inference service rejected the request: {0}")]
    RemoteValidation(String),
    #[error("Inference service failed ({status}): {message}")]
    RemoteServer { status: u16, message: String },
    #[error("Inference dependencies missing: {message}")]
    DependencyMissing {
        message: String,
        solution: Option<String>,
    },
    #[error("Inference error {code}: {message}")]
    Remote { code: String, message: String },
    #[error("Unexpected inference response: {0}")]
    Unknown(String),
}

/// Remote labelling service. Calls are side-effect free for the caller and
/// are never retried here.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn submit(&self, image_url: &str) -> Result<InferenceResult, InferenceError>;

    async fn health(&self) -> Result<SystemStatus, InferenceError>;
}

/// Health banner for the UI. A failed probe is reported as unreachable
/// rather than as an error.
pub async fn probe_health(client: &dyn InferenceClient) -> SystemStatus {
    match client.health().await {
        Ok(status) => status,
        Err(e) => {
            log::warn!("Inference health probe failed: {}", e);
            SystemStatus {
                status: ServiceStatus::Unreachable,
                model_name: None,
                checked_at: Utc::now(),
            }
        }
    }
}
