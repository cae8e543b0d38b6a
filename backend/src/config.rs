use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::inference::{DEFAULT_TIMEOUT_MS, HEALTH_TIMEOUT_MS};

pub const CONFIG_FILE_VAR: &str = "TAGGER_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("Could not read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Could not parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    #[default]
    DynamoDb,
    Http,
}

impl FromStr for HistoryBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamodb" | "ddb" => Ok(HistoryBackend::DynamoDb),
            "http" => Ok(HistoryBackend::Http),
            other => Err(ConfigError::Invalid {
                name: "HISTORY_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub bucket: String,
    pub asset_prefix: String,
    pub public_base_url: Option<String>,
    pub presign_ttl_secs: u64,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub inference_base_url: String,
    pub inference_path: String,
    pub inference_timeout_ms: u64,
    pub health_timeout_ms: u64,
    pub history_backend: HistoryBackend,
    pub history_table: Option<String>,
    pub history_base_url: Option<String>,
    pub history_limit: usize,
    pub max_upload_bytes: usize,
    pub static_dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            bucket: String::new(),
            asset_prefix: "images/".to_string(),
            public_base_url: None,
            presign_ttl_secs: 3600,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            inference_base_url: String::new(),
            inference_path: "/etiquetar".to_string(),
            inference_timeout_ms: DEFAULT_TIMEOUT_MS,
            health_timeout_ms: HEALTH_TIMEOUT_MS,
            history_backend: HistoryBackend::DynamoDb,
            history_table: None,
            history_base_url: None,
            history_limit: shared::DEFAULT_HISTORY_LIMIT,
            max_upload_bytes: shared::MAX_UPLOAD_BYTES,
            static_dir: None,
        }
    }
}

impl AppConfig {
    /// `.env`, then the YAML file named by `TAGGER_CONFIG`, then the process
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let env: HashMap<String, String> = std::env::vars().collect();
        let yaml = match env.get(CONFIG_FILE_VAR) {
            Some(path) => {
                log::info!("Reading configuration from {}", path);
                Some(std::fs::read_to_string(path)?)
            }
            None => None,
        };
        Self::from_sources(yaml.as_deref(), &env)
    }

    pub fn from_sources(
        yaml: Option<&str>,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut config: AppConfig = match yaml {
            Some(text) if !text.trim().is_empty() => serde_yaml::from_str(text)?,
            _ => AppConfig::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<(), ConfigError> {
        let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(v) = get("PORT") {
            self.port = parse("PORT", v)?;
        }
        if let Some(v) = get("S3_BUCKET_NAME") {
            self.bucket = v.to_string();
        }
        if let Some(v) = get("ASSET_PREFIX") {
            self.asset_prefix = v.to_string();
        }
        if let Some(v) = get("PUBLIC_BASE_URL") {
            self.public_base_url = Some(v.to_string());
        }
        if let Some(v) = get("PRESIGN_TTL_SECS") {
            self.presign_ttl_secs = parse("PRESIGN_TTL_SECS", v)?;
        }
        if let Some(v) = get("AWS_ENDPOINT_URL") {
            self.aws_endpoint_url = Some(v.to_string());
        }
        if let Some(v) = get("AWS_ACCESS_KEY_ID") {
            self.aws_access_key_id = Some(v.to_string());
        }
        if let Some(v) = get("AWS_SECRET_ACCESS_KEY") {
            self.aws_secret_access_key = Some(v.to_string());
        }
        if let Some(v) = get("INFERENCE_BASE_URL") {
            self.inference_base_url = v.to_string();
        }
        if let Some(v) = get("INFERENCE_PATH") {
            self.inference_path = v.to_string();
        }
        if let Some(v) = get("INFERENCE_TIMEOUT_MS") {
            self.inference_timeout_ms = parse("INFERENCE_TIMEOUT_MS", v)?;
        }
        if let Some(v) = get("HEALTH_TIMEOUT_MS") {
            self.health_timeout_ms = parse("HEALTH_TIMEOUT_MS", v)?;
        }
        if let Some(v) = get("HISTORY_BACKEND") {
            self.history_backend = v.parse()?;
        }
        if let Some(v) = get("DYNAMODB_HISTORY_TABLE") {
            self.history_table = Some(v.to_string());
        }
        if let Some(v) = get("HISTORY_BASE_URL") {
            self.history_base_url = Some(v.to_string());
        }
        if let Some(v) = get("HISTORY_LIMIT") {
            self.history_limit = parse("HISTORY_LIMIT", v)?;
        }
        if let Some(v) = get("MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse("MAX_UPLOAD_BYTES", v)?;
        }
        if let Some(v) = get("STATIC_DIR") {
            self.static_dir = Some(v.to_string());
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::Missing("S3_BUCKET_NAME"));
        }
        if self.inference_base_url.is_empty() {
            return Err(ConfigError::Missing("INFERENCE_BASE_URL"));
        }
        self.inference_url()?;
        if self.history_backend == HistoryBackend::DynamoDb && self.history_table.is_none() {
            return Err(ConfigError::Missing("DYNAMODB_HISTORY_TABLE"));
        }
        if self.history_backend == HistoryBackend::Http {
            self.history_url()?;
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "HISTORY_LIMIT",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn inference_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.inference_base_url).map_err(|_| ConfigError::Invalid {
            name: "INFERENCE_BASE_URL",
            value: self.inference_base_url.clone(),
        })
    }

    /// History served over HTTP defaults to the inference service itself.
    pub fn history_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .history_base_url
            .as_deref()
            .unwrap_or(&self.inference_base_url);
        Url::parse(raw).map_err(|_| ConfigError::Invalid {
            name: "HISTORY_BASE_URL",
            value: raw.to_string(),
        })
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Resolves `path` beneath `base`. Any path the base already carries is kept,
/// so a gateway mounted at `/labeler` still receives `/labeler/health`.
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let directory = format!("{}/", base.path());
        base.set_path(&directory);
    }
    base.join(path.trim_start_matches('/'))
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
