//! Round-trip tests against a live S3-compatible endpoint (e.g. MinIO).
//!
//! Run with:
//! S3_TEST_ENDPOINT=http://localhost:9000 S3_TEST_BUCKET=filevault-test \
//! AWS_ACCESS_KEY_ID=minioadmin AWS_SECRET_ACCESS_KEY=minioadmin \
//! cargo test -p filevault-storage --test s3_roundtrip -- --ignored

#![cfg(feature = "storage-s3")]

use filevault_storage::keys::generate_storage_key;
use filevault_storage::s3::S3Settings;
use filevault_storage::{bytes_reader, collect_stream, DirectUrl, S3Storage, Storage, StorageError};
use std::time::Duration;
use uuid::Uuid;

async fn test_storage() -> Option<S3Storage> {
    let endpoint = std::env::var("S3_TEST_ENDPOINT").ok()?;
    let settings = S3Settings {
        bucket: std::env::var("S3_TEST_BUCKET").unwrap_or_else(|_| "filevault-test".to_string()),
        region: std::env::var("S3_TEST_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        endpoint_url: Some(endpoint),
        access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
        secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
        request_timeout: Duration::from_secs(30),
        connect_timeout: Duration::from_secs(5),
    };
    Some(S3Storage::new(settings).await.expect("S3 client"))
}

#[tokio::test]
#[ignore = "requires S3_TEST_ENDPOINT"]
async fn test_s3_put_get_delete() {
    let Some(storage) = test_storage().await else {
        return;
    };

    let key = generate_storage_key(Uuid::new_v4(), "roundtrip.bin");
    for size in [0usize, 1, 8 * 1024 + 3, 256 * 1024] {
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let written = storage
            .put(&key, bytes_reader(data.clone()), "application/octet-stream", Some(size as u64))
            .await
            .unwrap();
        assert_eq!(written, size as u64);

        let stream = storage.get_stream(&key).await.unwrap();
        assert_eq!(collect_stream(stream, None).await.unwrap(), data);
    }

    assert!(storage.exists(&key).await.unwrap());
    storage.delete(&key).await.unwrap();
    storage.delete(&key).await.unwrap();
    assert!(!storage.exists(&key).await.unwrap());

    let missing = storage.get_stream(&key).await;
    assert!(matches!(missing, Err(StorageError::NotFound(_))));
}

#[tokio::test]
#[ignore = "requires S3_TEST_ENDPOINT"]
async fn test_s3_direct_url_is_presigned() {
    let Some(storage) = test_storage().await else {
        return;
    };

    let url = storage
        .direct_url("files/someone/object.png", Duration::from_secs(300))
        .await
        .unwrap();
    match url {
        DirectUrl::Presigned { url, expires_in } => {
            assert!(url.contains("object.png"));
            assert_eq!(expires_in, Duration::from_secs(300));
        }
        DirectUrl::Public(_) => panic!("S3 must presign"),
    }
}
