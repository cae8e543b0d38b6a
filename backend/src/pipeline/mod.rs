pub mod orchestrator;

use url::Url;

use crate::db::HistoryError;
use crate::inference::InferenceError;
use crate::storage::{StorageError, UploadFile};

pub use orchestrator::Orchestrator;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("No image file was provided")]
    MissingFile,
    #[error("File is too large: {size} bytes received, the limit is {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("Not an http(s) image URL: {0}")]
    InvalidUrl(String),
}

/// Failure of one analysis attempt, tagged by the stage that failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl AnalyzeError {
    pub fn stage(&self) -> &'static str {
        match self {
            AnalyzeError::Validation(_) => "validation",
            AnalyzeError::Storage(_) => "storage",
            AnalyzeError::Inference(_) => "inference",
        }
    }

    /// Message shown to the user, with the remediation hint when the service
    /// sent one.
    pub fn user_message(&self) -> String {
        match self {
            AnalyzeError::Inference(InferenceError::DependencyMissing {
                message,
                solution: Some(solution),
            }) => format!("{} ({})", message, solution),
            other => other.to_string(),
        }
    }
}

/// History failures never fail an analysis; this only feeds the log.
pub(crate) fn describe_history_failure(err: &HistoryError) -> String {
    match err {
        HistoryError::Backend(msg) => format!("history backend unavailable: {}", msg),
        other => other.to_string(),
    }
}

/// Checks an upload before anything leaves the process. Browsers that send
/// no usable content type get one guessed from the file extension.
pub fn validate_upload(
    file: Option<UploadFile>,
    max_bytes: usize,
) -> Result<UploadFile, ValidationError> {
    let mut file = file.ok_or(ValidationError::MissingFile)?;
    if file.bytes.is_empty() {
        return Err(ValidationError::MissingFile);
    }
    if file.bytes.len() > max_bytes {
        return Err(ValidationError::FileTooLarge {
            size: file.bytes.len(),
            limit: max_bytes,
        });
    }

    let declared = file.content_type.trim().to_ascii_lowercase();
    let content_type = if declared.is_empty() || declared == "application/octet-stream" {
        guess_image_type(&file.name).map(str::to_string).unwrap_or(declared)
    } else {
        declared
    };
    if !content_type.starts_with("image/") {
        return Err(ValidationError::UnsupportedType(content_type));
    }
    file.content_type = content_type;
    Ok(file)
}

pub fn guess_image_type(file_name: &str) -> Option<&'static str> {
    let (_, extension) = file_name.rsplit_once('.')?;
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

pub fn validate_image_url(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => Ok(url),
        _ => Err(ValidationError::InvalidUrl(trimmed.to_string())),
    }
}
