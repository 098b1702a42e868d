use crate::traits::{ByteReader, ByteStream, DirectUrl, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use uuid::Uuid;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/filevault/media")
    /// * `base_url` - Prefix under which the directory is served (e.g., "/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Only plain relative components are accepted, so a key can never resolve outside
    /// the base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(format!(
                "Storage key contains invalid characters: {}",
                storage_key
            )));
        }

        // `components()` folds away `.` and repeated separators, so check segments first.
        if storage_key
            .split('/')
            .any(|segment| segment.is_empty() || segment == ".")
        {
            return Err(StorageError::InvalidKey(format!(
                "Storage key has an empty or '.' segment: {}",
                storage_key
            )));
        }

        let relative = Path::new(storage_key);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(format!(
                "Storage key resolves outside storage directory: {}",
                storage_key
            )));
        }

        Ok(self.base_path.join(relative))
    }

    /// Generate public URL for file
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Sibling path the payload is written to before being renamed into place.
    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.part", Uuid::new_v4()));
        path.with_file_name(name)
    }

    async fn write_staged(&self, staging: &Path, mut reader: ByteReader) -> StorageResult<u64> {
        let mut file = fs::File::create(staging).await.map_err(|e| {
            StorageError::Io(format!(
                "Failed to create file {}: {}",
                staging.display(),
                e
            ))
        })?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::Io(format!(
                "Failed to write stream to file {}: {}",
                staging.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::Io(format!("Failed to sync file {}: {}", staging.display(), e))
        })?;

        Ok(bytes_copied)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(
        &self,
        key: &str,
        reader: ByteReader,
        _content_type: &str,
        _size_hint: Option<u64>,
    ) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        let staging = Self::staging_path(&path);
        let bytes_copied = match self.write_staged(&staging, reader).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage put failed"
                );
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StorageError::Io(format!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(bytes_copied)
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Io(format!("Failed to open file {}: {}", path.display(), e)),
        })?;

        let reader = tokio_util::io::ReaderStream::with_capacity(file, READ_CHUNK_SIZE);

        let key = key.to_string();
        let path_display = path.display().to_string();
        let stream = reader.map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    error = %e,
                    path = %path_display,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream read error"
                );
                StorageError::Io(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn direct_url(&self, key: &str, _ttl: Duration) -> StorageResult<DirectUrl> {
        self.key_to_path(key)?;
        Ok(DirectUrl::Public(self.generate_url(key)))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
