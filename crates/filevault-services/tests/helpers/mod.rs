#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use filevault_core::{Config, ManualClock};
use filevault_db::InMemoryDatabase;
use filevault_services::{
    FileService, PurgeService, ShareLinkService, StorageOrchestrator, UploadRequest,
};
use filevault_storage::{
    bytes_reader, collect_stream, ByteReader, ByteStream, DirectUrl, LocalStorage, Storage,
    StorageBackend, StorageError, StorageResult,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Storage decorator that counts every backend call and can be told to fail deletes.
pub struct CountingStorage {
    inner: Arc<dyn Storage>,
    calls: AtomicUsize,
    failing_deletes: Mutex<HashSet<String>>,
}

impl CountingStorage {
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            failing_deletes: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_deletes_of(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_deletes.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn put(
        &self,
        key: &str,
        reader: ByteReader,
        content_type: &str,
        size_hint: Option<u64>,
    ) -> StorageResult<u64> {
        self.record();
        self.inner.put(key, reader, content_type, size_hint).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.record();
        self.inner.get_stream(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.record();
        if self.failing_deletes.lock().unwrap().contains(key) {
            return Err(StorageError::Io(format!("delete of {} refused", key)));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.record();
        self.inner.exists(key).await
    }

    async fn direct_url(&self, key: &str, ttl: Duration) -> StorageResult<DirectUrl> {
        self.record();
        self.inner.direct_url(key, ttl).await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}

/// Services wired against local storage in a temp dir, in-memory repositories and a
/// manual clock.
pub struct TestApp {
    pub config: Config,
    pub storage: Arc<CountingStorage>,
    pub db: InMemoryDatabase,
    pub clock: Arc<ManualClock>,
    pub orchestrator: Arc<StorageOrchestrator>,
    pub files: FileService,
    pub shares: ShareLinkService,
    pub purge: PurgeService,
    pub _temp_dir: TempDir,
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

pub async fn setup_test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config = Config::default();
    configure(&mut config);

    let local = LocalStorage::new(temp_dir.path(), "/media".to_string())
        .await
        .expect("Failed to create local storage");
    let storage = Arc::new(CountingStorage::new(Arc::new(local)));

    let db = InMemoryDatabase::new();
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let orchestrator = Arc::new(StorageOrchestrator::new(
        storage.clone(),
        &config.upload,
        config.thumbnail.clone(),
        clock.clone(),
    ));
    let files = FileService::new(
        orchestrator.clone(),
        Arc::new(db.files()),
        clock.clone(),
        config.purge_on_delete,
        config.direct_url_ttl(),
    );
    let shares = ShareLinkService::new(
        Arc::new(db.share_links()),
        Arc::new(db.files()),
        orchestrator.clone(),
        config.share.clone(),
        clock.clone(),
    );
    let purge = PurgeService::new(
        orchestrator.clone(),
        Arc::new(db.files()),
        clock.clone(),
        config.purge_batch_size,
    );

    TestApp {
        config,
        storage,
        db,
        clock,
        orchestrator,
        files,
        shares,
        purge,
        _temp_dir: temp_dir,
    }
}

impl TestApp {
    pub async fn exists(&self, key: &str) -> bool {
        self.storage.exists(key).await.expect("exists")
    }

    pub async fn read(&self, key: &str) -> Vec<u8> {
        let stream = self.storage.get_stream(key).await.expect("get_stream");
        collect_stream(stream, None).await.expect("collect")
    }

    /// Number of regular files under the storage root, staging files included.
    pub fn stored_file_count(&self) -> usize {
        fn walk(dir: &Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|entry| {
                            let path = entry.path();
                            if path.is_dir() {
                                walk(&path)
                            } else {
                                1
                            }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        walk(self._temp_dir.path())
    }
}

pub fn upload_request(
    owner_id: Uuid,
    filename: &str,
    content_type: &str,
    data: Vec<u8>,
) -> UploadRequest {
    UploadRequest {
        owner_id,
        filename: filename.to_string(),
        content_type: content_type.to_string(),
        declared_size: data.len() as u64,
        body: bytes_reader(data),
    }
}

pub fn text_request(owner_id: Uuid, text: &str) -> UploadRequest {
    upload_request(owner_id, "notes.txt", "text/plain", text.as_bytes().to_vec())
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 128, 255])));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("encode png");
    buffer
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([240, 200, 10])));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .expect("encode jpeg");
    buffer
}
