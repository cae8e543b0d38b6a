use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use shared::{ImageAsset, StoredAsset};

use super::{display_name_from_key, AssetStore, KeyClock, PresignedUrls, StorageError, UploadFile};

#[derive(Clone)]
pub struct S3Service {
    client: Client,
    bucket_name: String,
    prefix: String,
    public_base_url: Option<String>,
    presign_ttl: Duration,
    presigned: Arc<PresignedUrls>,
    clock: Arc<KeyClock>,
}

impl S3Service {
    pub fn new(
        client: Client,
        bucket_name: String,
        prefix: String,
        public_base_url: Option<String>,
        presign_ttl: Duration,
    ) -> Self {
        Self {
            client,
            bucket_name,
            prefix,
            public_base_url,
            presign_ttl,
            presigned: Arc::new(PresignedUrls::new()),
            clock: Arc::new(KeyClock::new()),
        }
    }
}

#[async_trait]
impl AssetStore for S3Service {
    async fn put(&self, file: &UploadFile) -> Result<ImageAsset, StorageError> {
        let s3_key = self.clock.next_key(&self.prefix, &file.name);
        info!(
            "Uploading {} ({} bytes) to s3://{}/{}",
            file.name,
            file.bytes.len(),
            self.bucket_name,
            s3_key
        );

        let body = ByteStream::from(file.bytes.clone());
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&s3_key)
            .body(body)
            .content_type(&file.content_type)
            .send()
            .await
            .map_err(|e| {
                error!("S3 put_object failed for {}: {}", s3_key, DisplayErrorContext(&e));
                classify_sdk_error(&s3_key, e)
            })?;

        let public_url = self.resolve_url(&s3_key).await?;
        Ok(ImageAsset {
            display_name: display_name_from_key(&s3_key),
            storage_key: s3_key,
            public_url,
            uploaded_at: Utc::now(),
        })
    }

    async fn resolve_url(&self, storage_key: &str) -> Result<String, StorageError> {
        if let Some(base) = &self.public_base_url {
            return Ok(public_object_url(base, storage_key));
        }

        let signed_at = Utc::now();
        if let Some(url) = self.presigned.get(storage_key, signed_at) {
            return Ok(url);
        }

        let config = PresigningConfig::expires_in(self.presign_ttl)
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(storage_key)
            .presigned(config)
            .await
            .map_err(|e| classify_sdk_error(storage_key, e))?;

        let url = presigned.uri().to_string();
        self.presigned
            .insert(storage_key, url.clone(), signed_at, self.presign_ttl);
        Ok(url)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredAsset>, StorageError> {
        let mut assets = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| {
                    error!("S3 list_objects_v2 failed for prefix {}: {}", prefix, DisplayErrorContext(&e));
                    classify_sdk_error(prefix, e)
                })?;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                if key.ends_with('/') {
                    continue;
                }
                let uploaded_at = object
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_else(Utc::now);

                assets.push(StoredAsset {
                    storage_key: key.to_string(),
                    display_name: display_name_from_key(key),
                    uploaded_at,
                });
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!("Listed {} objects under {}", assets.len(), prefix);
        Ok(assets)
    }

    async fn delete(&self, storage_key: &str) -> Result<(), StorageError> {
        // S3 reports success for deletes of missing keys, so probe first.
        if let Err(e) = self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(storage_key)
            .send()
            .await
        {
            if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                return Err(StorageError::NotFound(storage_key.to_string()));
            }
            return Err(classify_sdk_error(storage_key, e));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(storage_key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(storage_key, e))?;

        self.presigned.forget(storage_key);
        info!("Deleted s3://{}/{}", self.bucket_name, storage_key);
        Ok(())
    }
}

pub fn public_object_url(base: &str, storage_key: &str) -> String {
    let encoded: Vec<String> = storage_key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", base.trim_end_matches('/'), encoded.join("/"))
}

fn classify_sdk_error<E, R>(context: &str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!("{}: {}", context, DisplayErrorContext(&err));
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            StorageError::NetworkFailure(message)
        }
        _ => classify_error_code(err.as_service_error().and_then(|e| e.code()), message),
    }
}

pub fn classify_error_code(code: Option<&str>, message: String) -> StorageError {
    match code {
        Some(
            "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken"
            | "InvalidToken",
        ) => StorageError::Unauthorized(message),
        Some("QuotaExceeded" | "EntityTooLarge" | "SlowDown" | "ServiceUnavailable") => {
            StorageError::QuotaExceeded(message)
        }
        Some("NoSuchKey" | "NotFound") => StorageError::NotFound(message),
        Some("RequestTimeout") => StorageError::NetworkFailure(message),
        _ => StorageError::Other(message),
    }
}
