use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use reqwest::Client;
use shared::wire::{
    HealthResponse, InferenceRequest, InferenceResponse, InferenceSuccess, TransportErrorBody,
    DEPENDENCIES_MISSING,
};
use shared::{InferenceResult, Label, ServiceStatus, SystemStatus};
use url::Url;

use super::{InferenceClient, InferenceError};
use crate::config::endpoint_url;

/// What came back from the service, before it is turned into a result.
#[derive(Debug)]
pub enum InferenceOutcome {
    Success(InferenceSuccess),
    DomainError {
        kind: String,
        message: String,
        solution: Option<String>,
    },
    TransportError {
        status: u16,
        detail: Option<String>,
    },
}

impl InferenceOutcome {
    pub fn decode(status: u16, body: &str) -> Result<Self, InferenceError> {
        if !(200..300).contains(&status) {
            let detail = serde_json::from_str::<TransportErrorBody>(body)
                .ok()
                .and_then(|b| b.describe())
                .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()));
            return Ok(InferenceOutcome::TransportError { status, detail });
        }

        match serde_json::from_str::<InferenceResponse>(body) {
            Ok(InferenceResponse::Success(success)) => Ok(InferenceOutcome::Success(success)),
            Ok(InferenceResponse::Error(failure)) => Ok(InferenceOutcome::DomainError {
                kind: failure.error,
                message: failure.message,
                solution: failure.solution,
            }),
            Err(e) => Err(InferenceError::Unknown(format!(
                "could not decode response: {}",
                e
            ))),
        }
    }

    pub fn into_result(self, source_url: &str) -> Result<InferenceResult, InferenceError> {
        match self {
            InferenceOutcome::Success(success) => {
                let labels = success
                    .labels
                    .into_iter()
                    .filter_map(|l| Label::new(l.label, l.score, l.percentage))
                    .collect();
                Ok(InferenceResult::new(
                    source_url.to_string(),
                    labels,
                    success.model,
                    success.processing_time_seconds,
                    Utc::now(),
                ))
            }
            InferenceOutcome::DomainError {
                kind,
                message,
                solution,
            } => {
                if kind == DEPENDENCIES_MISSING {
                    Err(InferenceError::DependencyMissing { message, solution })
                } else {
                    Err(InferenceError::Remote {
                        code: kind,
                        message,
                    })
                }
            }
            InferenceOutcome::TransportError { status, detail } => {
                let message = detail.unwrap_or_else(|| format!("HTTP {}", status));
                match status {
                    400..=499 => Err(InferenceError::RemoteValidation(message)),
                    500..=599 => Err(InferenceError::RemoteServer { status, message }),
                    _ => Err(InferenceError::Unknown(message)),
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct HttpInferenceClient {
    client: Client,
    submit_url: Url,
    health_url: Url,
    timeout: Duration,
    health_timeout: Duration,
}

impl HttpInferenceClient {
    pub fn new(
        client: Client,
        base_url: &Url,
        submit_path: &str,
        timeout: Duration,
        health_timeout: Duration,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            submit_url: endpoint_url(base_url, submit_path)?,
            health_url: endpoint_url(base_url, "health")?,
            timeout,
            health_timeout,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error, timeout: Duration) -> InferenceError {
        if err.is_timeout() {
            InferenceError::Timeout(timeout.as_millis() as u64)
        } else if err.is_connect() || err.is_request() {
            InferenceError::Unreachable(err.to_string())
        } else {
            InferenceError::Unknown(err.to_string())
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn submit(&self, image_url: &str) -> Result<InferenceResult, InferenceError> {
        info!("Submitting {} to {}", image_url, self.submit_url);

        let response = self
            .client
            .post(self.submit_url.clone())
            .timeout(self.timeout)
            .json(&InferenceRequest {
                url: image_url.to_string(),
            })
            .send()
            .await
            .map_err(|e| {
                error!("Inference request failed: {}", e);
                self.map_transport_error(e, self.timeout)
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e, self.timeout))?;
        debug!("Inference responded with HTTP {}", status);

        let outcome = InferenceOutcome::decode(status, &body)?;
        if let InferenceOutcome::DomainError { kind, message, .. } = &outcome {
            warn!("Inference service reported {}: {}", kind, message);
        }
        outcome.into_result(image_url)
    }

    async fn health(&self) -> Result<SystemStatus, InferenceError> {
        let response = self
            .client
            .get(self.health_url.clone())
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e, self.health_timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::RemoteServer {
                status: status.as_u16(),
                message: "health probe failed".to_string(),
            });
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Unknown(e.to_string()))?;

        Ok(SystemStatus {
            status: match health.status.as_str() {
                "ok" | "healthy" => ServiceStatus::Healthy,
                _ => ServiceStatus::Degraded,
            },
            model_name: health.model_name,
            checked_at: Utc::now(),
        })
    }
}
