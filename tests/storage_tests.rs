use community_api::{
    AppConfig,
    storage::{MockStorageService, S3StorageClient, StorageService},
};
use uuid::Uuid;

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let url = mock
            .presigned_upload_url("posts/abc/photo.png", "image/png")
            .await
            .unwrap();

        assert!(url.contains("signature=fake"));
        assert!(url.contains("posts/abc/photo.png"));
        assert!(url.contains("content-type=image/png"));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        assert!(mock.presigned_upload_url("posts/abc/photo.png", "image/png").await.is_err());
        // Bucket setup never fails.
        assert!(mock.ensure_bucket_exists().await.is_ok());
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    #[tokio::test]
    async fn test_s3_client_creation() {
        let _client = S3StorageClient::new(&AppConfig::default());
    }

    // Presigning is a local signature computation; no server is contacted.
    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        let client = S3StorageClient::new(&AppConfig::default());
        let key = format!("posts/{}/{}.png", Uuid::new_v4(), Uuid::new_v4());

        let url = client.presigned_upload_url(&key, "image/png").await.unwrap();

        assert!(url.starts_with("http://localhost:9000/community-test/"));
        assert!(url.contains(&key));
        assert!(url.contains("X-Amz-Expires=600"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
