#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::{s3::S3Settings, S3Storage};
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use filevault_core::Config;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let backend = config.storage_backend();

    tracing::info!(backend = %backend, "Initializing storage backend");

    match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket()
                .map(String::from)
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;

            let settings = S3Settings {
                bucket,
                region,
                endpoint_url: config.s3_endpoint().map(String::from),
                access_key_id: config.storage.aws_access_key_id.clone(),
                secret_access_key: config.storage.aws_secret_access_key.clone(),
                request_timeout: std::time::Duration::from_secs(
                    config.storage.s3_request_timeout_secs,
                ),
                connect_timeout: std::time::Duration::from_secs(
                    config.storage.s3_connect_timeout_secs,
                ),
            };

            let storage = S3Storage::new(settings).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(
                config.local_storage_path(),
                config.local_storage_base_url().to_string(),
            )
            .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use filevault_core::config::StorageConfig;

    #[tokio::test]
    async fn test_creates_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage: StorageConfig {
                backend: StorageBackend::Local,
                local_storage_path: dir.path().join("media").display().to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
        assert!(dir.path().join("media").is_dir());
    }

    #[cfg(feature = "storage-s3")]
    #[tokio::test]
    async fn test_s3_requires_bucket() {
        let config = Config {
            storage: StorageConfig {
                backend: StorageBackend::S3,
                s3_region: Some("us-east-1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
