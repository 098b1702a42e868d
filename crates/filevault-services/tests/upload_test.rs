mod helpers;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filevault_core::models::FileObject;
use filevault_core::AppError;
use filevault_db::{FileRepository, InMemoryFileRepository};
use filevault_services::{FileService, UploadRequest};
use filevault_storage::keys::thumbnail_key;
use filevault_storage::{bytes_reader, collect_stream};
use helpers::{
    jpeg_bytes, png_bytes, setup_test_app, setup_test_app_with, text_request, upload_request,
};
use uuid::Uuid;

#[tokio::test]
async fn test_upload_text_round_trip() {
    let app = setup_test_app().await;
    let owner = Uuid::new_v4();

    let file = app
        .files
        .upload(text_request(owner, "hello, vault"))
        .await
        .unwrap();

    assert_eq!(file.owner_id, owner);
    assert_eq!(file.original_name, "notes.txt");
    assert_eq!(file.media_type, "text/plain");
    assert_eq!(file.size_bytes, 12);
    assert!(file.storage_key.starts_with(&format!("files/{}/", owner)));
    assert!(file.storage_key.ends_with(".txt"));
    assert!(!file.is_deleted());

    let download = app.files.download(owner, file.id).await.unwrap();
    assert_eq!(download.content_type, "text/plain");
    assert_eq!(download.content_length, 12);
    assert_eq!(download.suggested_filename, "notes.txt");
    let body = collect_stream(download.stream, None).await.unwrap();
    assert_eq!(body, b"hello, vault");

    // No thumbnail for non-images
    assert!(!app.orchestrator.thumbnail_exists(&file).await);
    assert!(app.files.thumbnail_url(owner, file.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_declared_size_over_limit_makes_no_backend_calls() {
    let app = setup_test_app_with(|c| c.upload.max_file_size_bytes = 1024).await;
    let owner = Uuid::new_v4();

    let request = UploadRequest {
        owner_id: owner,
        filename: "big.txt".to_string(),
        content_type: "text/plain".to_string(),
        declared_size: 4096,
        body: bytes_reader(vec![b'a'; 4096]),
    };

    let err = app.files.upload(request).await.unwrap_err();
    assert!(matches!(err, AppError::TooLarge { size: 4096, max: 1024 }));
    assert_eq!(app.storage.calls(), 0);
    assert_eq!(app.files.list(owner, 1, None).await.unwrap().count, 0);
}

#[tokio::test]
async fn test_size_is_checked_before_type() {
    let app = setup_test_app_with(|c| c.upload.max_file_size_bytes = 10).await;

    let request = upload_request(
        Uuid::new_v4(),
        "tool.exe",
        "application/x-msdownload",
        vec![0u8; 64],
    );
    let err = app.files.upload(request).await.unwrap_err();
    assert!(matches!(err, AppError::TooLarge { .. }));
}

#[tokio::test]
async fn test_unsupported_declared_type() {
    let app = setup_test_app().await;

    let request = upload_request(
        Uuid::new_v4(),
        "tool.exe",
        "application/x-msdownload",
        b"MZ\x90\x00".to_vec(),
    );
    let err = app.files.upload(request).await.unwrap_err();
    assert!(matches!(err, AppError::UnsupportedType(_)));
    assert_eq!(app.storage.calls(), 0);
}

#[tokio::test]
async fn test_declared_png_with_garbage_bytes_is_rejected() {
    let app = setup_test_app().await;
    let owner = Uuid::new_v4();

    let request = upload_request(owner, "fake.png", "image/png", vec![0x00, 0x01, 0x02, 0xff]);
    let err = app.files.upload(request).await.unwrap_err();

    match err {
        AppError::ContentMismatch { declared, detected } => {
            assert_eq!(declared, "image/png");
            assert_eq!(detected, "application/octet-stream");
        }
        other => panic!("expected ContentMismatch, got {:?}", other),
    }
    assert_eq!(app.storage.calls(), 0);
    assert_eq!(app.stored_file_count(), 0);
}

#[tokio::test]
async fn test_declared_type_parameters_are_ignored() {
    let app = setup_test_app().await;
    let owner = Uuid::new_v4();

    let request = upload_request(owner, "readme", "Text/Plain; charset=utf-8", b"plain".to_vec());
    let file = app.files.upload(request).await.unwrap();

    assert_eq!(file.media_type, "text/plain");
    // No extension in the filename, none in the key
    assert!(!file.storage_key.rsplit('/').next().unwrap().contains('.'));
}

#[tokio::test]
async fn test_body_longer_than_declared_is_rejected_and_removed() {
    let app = setup_test_app_with(|c| c.upload.max_file_size_bytes = 1024).await;
    let owner = Uuid::new_v4();

    let request = UploadRequest {
        owner_id: owner,
        filename: "liar.txt".to_string(),
        content_type: "text/plain".to_string(),
        declared_size: 100,
        body: bytes_reader(vec![b'x'; 5000]),
    };

    let err = app.files.upload(request).await.unwrap_err();
    match err {
        AppError::TooLarge { size, max } => {
            assert_eq!(max, 1024);
            assert!(size > max);
        }
        other => panic!("expected TooLarge, got {:?}", other),
    }
    assert_eq!(app.stored_file_count(), 0);
    assert_eq!(app.files.list(owner, 1, None).await.unwrap().count, 0);
}

#[tokio::test]
async fn test_body_exactly_at_limit_is_accepted() {
    let app = setup_test_app_with(|c| c.upload.max_file_size_bytes = 1024).await;
    let owner = Uuid::new_v4();

    let file = app
        .files
        .upload(upload_request(owner, "full.txt", "text/plain", vec![b'y'; 1024]))
        .await
        .unwrap();

    assert_eq!(file.size_bytes, 1024);
    assert_eq!(app.read(&file.storage_key).await.len(), 1024);
}

#[tokio::test]
async fn test_png_upload_gets_bounded_thumbnail() {
    let app = setup_test_app().await;
    let owner = Uuid::new_v4();

    let file = app
        .files
        .upload(upload_request(owner, "wide.png", "image/png", png_bytes(800, 400)))
        .await
        .unwrap();

    assert!(file.is_image());
    assert!(app.orchestrator.thumbnail_exists(&file).await);

    let key = thumbnail_key(&file.storage_key).unwrap();
    let thumb = image::load_from_memory(&app.read(&key).await).unwrap();
    assert_eq!(thumb.width(), 200);
    assert_eq!(thumb.height(), 100);

    let url = app.files.thumbnail_url(owner, file.id).await.unwrap().unwrap();
    assert_eq!(url.url(), format!("/media/{}", key));
}

#[tokio::test]
async fn test_jpeg_thumbnail_keeps_format() {
    let app = setup_test_app().await;
    let owner = Uuid::new_v4();

    let file = app
        .files
        .upload(upload_request(owner, "tall.jpg", "image/jpeg", jpeg_bytes(300, 900)))
        .await
        .unwrap();

    let key = thumbnail_key(&file.storage_key).unwrap();
    let data = app.read(&key).await;
    assert_eq!(
        image::guess_format(&data).unwrap(),
        image::ImageFormat::Jpeg
    );
    let thumb = image::load_from_memory(&data).unwrap();
    assert!(thumb.width() <= 200 && thumb.height() <= 200);
    assert_eq!(thumb.height(), 200);
}

#[tokio::test]
async fn test_small_image_thumbnail_is_not_upscaled() {
    let app = setup_test_app().await;
    let owner = Uuid::new_v4();

    let file = app
        .files
        .upload(upload_request(owner, "icon.png", "image/png", png_bytes(32, 16)))
        .await
        .unwrap();

    let key = thumbnail_key(&file.storage_key).unwrap();
    let thumb = image::load_from_memory(&app.read(&key).await).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (32, 16));
}

#[tokio::test]
async fn test_concurrent_uploads_get_distinct_keys() {
    let app = Arc::new(setup_test_app().await);
    let owner = Uuid::new_v4();

    let mut handles = Vec::new();
    for i in 0..20 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.files
                .upload(text_request(owner, &format!("file {}", i)))
                .await
                .unwrap()
        }));
    }

    let mut keys = std::collections::HashSet::new();
    for handle in handles {
        let file = handle.await.unwrap();
        assert!(keys.insert(file.storage_key));
    }
    assert_eq!(app.files.list(owner, 1, Some(100)).await.unwrap().count, 20);
}

/// Accepts nothing, so every upload fails at the metadata step.
struct RejectingFileRepository(InMemoryFileRepository);

#[async_trait]
impl FileRepository for RejectingFileRepository {
    async fn insert(&self, _file: &FileObject) -> Result<(), AppError> {
        Err(AppError::Internal("insert refused".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<FileObject>, AppError> {
        self.0.get(id).await
    }

    async fn get_active_for_owner(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FileObject>, AppError> {
        self.0.get_active_for_owner(owner_id, id).await
    }

    async fn list_active_for_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileObject>, AppError> {
        self.0.list_active_for_owner(owner_id, limit, offset).await
    }

    async fn count_active_for_owner(&self, owner_id: Uuid) -> Result<i64, AppError> {
        self.0.count_active_for_owner(owner_id).await
    }

    async fn soft_delete(
        &self,
        owner_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FileObject>, AppError> {
        self.0.soft_delete(owner_id, id, at).await
    }

    async fn restore(
        &self,
        owner_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FileObject>, AppError> {
        self.0.restore(owner_id, id, at).await
    }

    async fn list_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileObject>, AppError> {
        self.0.list_deleted_before(cutoff, limit).await
    }

    async fn hard_delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.0.hard_delete(id).await
    }
}

#[tokio::test]
async fn test_failed_metadata_insert_removes_stored_objects() {
    let app = setup_test_app().await;
    let service = FileService::new(
        app.orchestrator.clone(),
        Arc::new(RejectingFileRepository(app.db.files())),
        app.clock.clone(),
        true,
        app.config.direct_url_ttl(),
    );

    let err = service
        .upload(upload_request(
            Uuid::new_v4(),
            "photo.png",
            "image/png",
            png_bytes(400, 400),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(app.stored_file_count(), 0);
}
