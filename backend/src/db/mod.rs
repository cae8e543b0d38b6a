pub mod dynamodb_repository;
pub mod http_repository;

use async_trait::async_trait;
use shared::HistoryRecord;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("History record not found: {0}")]
    NotFound(String),
    #[error("History backend does not support deletion")]
    DeleteUnsupported,
    #[error("History backend error: {0}")]
    Backend(String),
    #[error("Invalid history data: {0}")]
    InvalidData(String),
}

/// Append-only log of completed inferences. Deletion is optional; backends
/// without it report [`HistoryError::DeleteUnsupported`].
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn append(&self, record: &HistoryRecord) -> Result<String, HistoryError>;

    /// Newest first, at most `limit` records.
    async fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>, HistoryError>;

    async fn delete(&self, id: &str) -> Result<(), HistoryError>;
}
