use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

/// How long a presigned upload URL stays valid.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// StorageService
///
/// Object storage used for post images and avatars. Clients upload directly with a
/// presigned URL; the server never proxies file bodies.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the bucket if missing. Only called in local mode against MinIO.
    async fn ensure_bucket_exists(&self) -> AppResult<()>;

    /// A PUT URL for `key`, valid for [`UPLOAD_URL_TTL`] and bound to `content_type`.
    async fn presigned_upload_url(&self, key: &str, content_type: &str) -> AppResult<String>;
}

pub type StorageState = Arc<dyn StorageService>;

/// S3StorageClient
///
/// AWS SDK client pointed at MinIO locally and Supabase Storage in production.
/// Both need path-style addressing.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub fn new(config: &AppConfig) -> Self {
        let credentials = s3::config::Credentials::new(
            config.s3_key.as_str(),
            config.s3_secret.as_str(),
            None,
            None,
            "static",
        );

        let s3_config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(config.s3_endpoint.as_str())
            .region(s3::config::Region::new(config.s3_region.clone()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(s3_config),
            bucket_name: config.s3_bucket.clone(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) -> AppResult<()> {
        if self.client.head_bucket().bucket(&self.bucket_name).send().await.is_ok() {
            return Ok(());
        }
        self.client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("create bucket {}: {e}", self.bucket_name)))?;
        tracing::info!(bucket = %self.bucket_name, "storage bucket created");
        Ok(())
    }

    async fn presigned_upload_url(&self, key: &str, content_type: &str) -> AppResult<String> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| AppError::Internal(format!("presigning config: {e}")))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Upstream(format!("presign {key}: {e}")))?;

        Ok(request.uri().to_string())
    }
}

/// MockStorageService
///
/// Deterministic stand-in for handler tests; no network access.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every call fails as an upstream error.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) -> AppResult<()> {
        Ok(())
    }

    async fn presigned_upload_url(&self, key: &str, content_type: &str) -> AppResult<String> {
        if self.should_fail {
            return Err(AppError::Upstream("mock storage failure".to_string()));
        }
        Ok(format!(
            "http://localhost:9000/mock-bucket/{key}?content-type={content_type}&signature=fake"
        ))
    }
}
