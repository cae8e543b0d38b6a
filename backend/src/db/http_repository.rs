use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::{Client, StatusCode};
use shared::wire::{HistoryAppendResponse, HistoryListResponse};
use shared::{newest_first, HistoryRecord};
use url::Url;

use super::{HistoryError, HistoryRepository};
use crate::config::endpoint_url;

/// History kept by the inference service itself under `history`, relative to
/// the configured base.
#[derive(Clone)]
pub struct HttpHistoryRepository {
    client: Client,
    history_url: Url,
}

impl HttpHistoryRepository {
    pub fn new(client: Client, base_url: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            history_url: endpoint_url(base_url, "history")?,
        })
    }

    fn record_url(&self, id: &str) -> Result<Url, HistoryError> {
        let mut url = self.history_url.clone();
        url.path_segments_mut()
            .map_err(|_| HistoryError::Backend("history URL cannot be a base".to_string()))?
            .push(id);
        Ok(url)
    }
}

pub fn classify_delete_status(status: StatusCode, id: &str) -> Result<(), HistoryError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(HistoryError::NotFound(id.to_string())),
        StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => {
            Err(HistoryError::DeleteUnsupported)
        }
        s => Err(HistoryError::Backend(format!("delete returned HTTP {}", s))),
    }
}

#[async_trait]
impl HistoryRepository for HttpHistoryRepository {
    async fn append(&self, record: &HistoryRecord) -> Result<String, HistoryError> {
        let response = self
            .client
            .post(self.history_url.clone())
            .json(record)
            .send()
            .await
            .map_err(|e| HistoryError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            error!("History append returned HTTP {}", response.status());
            return Err(HistoryError::Backend(format!(
                "append returned HTTP {}",
                response.status()
            )));
        }

        let body: HistoryAppendResponse = response
            .json()
            .await
            .map_err(|e| HistoryError::InvalidData(e.to_string()))?;
        info!("Appended history record {}", body.id);
        Ok(body.id)
    }

    async fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>, HistoryError> {
        let response = self
            .client
            .get(self.history_url.clone())
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| HistoryError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HistoryError::Backend(format!(
                "list returned HTTP {}",
                response.status()
            )));
        }

        let body: HistoryListResponse = response
            .json()
            .await
            .map_err(|e| HistoryError::InvalidData(e.to_string()))?;
        if body.status != "success" && body.status != "ok" {
            warn!("History list reported status {}", body.status);
        }
        Ok(newest_first(body.records, limit))
    }

    async fn delete(&self, id: &str) -> Result<(), HistoryError> {
        let response = self
            .client
            .delete(self.record_url(id)?)
            .send()
            .await
            .map_err(|e| HistoryError::Backend(e.to_string()))?;

        classify_delete_status(response.status(), id)
    }
}
