//! Configuration module
//!
//! Everything the storage core needs is read once at startup into `Config` and handed to
//! constructors. Services receive the typed sub-configs (`UploadPolicy`, `ThumbnailConfig`,
//! `ShareLinkPolicy`) rather than reaching into the environment themselves.

use std::env;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::models::ShareDuration;
use crate::storage_types::StorageBackend;

// Common constants
const MAX_FILE_SIZE_MB: u64 = 10;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const S3_REQUEST_TIMEOUT_SECS: u64 = 30;
const S3_CONNECT_TIMEOUT_SECS: u64 = 5;
const THUMBNAIL_MAX_DIMENSION: u32 = 200;
const THUMBNAIL_QUALITY: u8 = 85;
const SHARE_TOKEN_BYTES: usize = 32;
const MIN_SHARE_TOKEN_BYTES: usize = 16;
const DIRECT_URL_TTL_SECS: u64 = 3600;
const PURGE_BATCH_SIZE: i64 = 100;

const DEFAULT_ALLOWED_CONTENT_TYPES: &str =
    "image/png,image/jpeg,image/gif,image/webp,application/pdf,text/plain";
const DEFAULT_SHARE_LINK_DURATIONS: &str = "1h=3600,24h=86400,7d=604800";
const DEFAULT_SHARE_LINK_DURATION: &str = "24h";

/// Object store selection and connection settings.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub s3_request_timeout_secs: u64,
    pub s3_connect_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./media".to_string(),
            local_storage_base_url: "/media".to_string(),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            s3_request_timeout_secs: S3_REQUEST_TIMEOUT_SECS,
            s3_connect_timeout_secs: S3_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Upload acceptance rules.
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    pub max_file_size_bytes: u64,
    /// Lower-cased MIME types; applied to both the declared and the sniffed type.
    pub allowed_content_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_content_types: split_list(DEFAULT_ALLOWED_CONTENT_TYPES),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ThumbnailConfig {
    /// Neither side of a thumbnail exceeds this many pixels.
    pub max_dimension: u32,
    /// Encoder quality for lossy formats (JPEG, WebP).
    pub quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_dimension: THUMBNAIL_MAX_DIMENSION,
            quality: THUMBNAIL_QUALITY,
        }
    }
}

/// Share-link duration choices and token size.
#[derive(Clone, Debug)]
pub struct ShareLinkPolicy {
    /// (label, seconds) in the order they were configured.
    pub durations: Vec<(String, i64)>,
    pub default_choice: String,
    pub token_bytes: usize,
}

impl Default for ShareLinkPolicy {
    fn default() -> Self {
        Self {
            durations: parse_duration_choices(DEFAULT_SHARE_LINK_DURATIONS)
                .unwrap_or_default(),
            default_choice: DEFAULT_SHARE_LINK_DURATION.to_string(),
            token_bytes: SHARE_TOKEN_BYTES,
        }
    }
}

impl ShareLinkPolicy {
    /// Exact lookup of a configured choice.
    pub fn lookup(&self, choice: &str) -> Option<ShareDuration> {
        let choice = choice.trim();
        self.durations
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(choice))
            .map(|(label, secs)| ShareDuration {
                label: label.clone(),
                duration: Duration::seconds(*secs),
            })
    }

    /// Lookup with fallback: an unrecognized choice resolves to the default choice.
    pub fn resolve(&self, choice: &str) -> ShareDuration {
        if let Some(duration) = self.lookup(choice) {
            return duration;
        }

        tracing::warn!(
            requested = %choice,
            fallback = %self.default_choice,
            "Unrecognized share duration, using default"
        );

        self.lookup(&self.default_choice)
            .unwrap_or_else(|| ShareDuration {
                label: self.default_choice.clone(),
                duration: Duration::hours(24),
            })
    }

    pub fn choices(&self) -> impl Iterator<Item = &str> {
        self.durations.iter().map(|(label, _)| label.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: MAX_CONNECTIONS,
            timeout_seconds: CONNECTION_TIMEOUT_SECS,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub storage: StorageConfig,
    pub upload: UploadPolicy,
    pub thumbnail: ThumbnailConfig,
    pub share: ShareLinkPolicy,
    pub database: DatabaseConfig,
    pub direct_url_ttl_secs: u64,
    /// Reclaim object bytes as soon as a file is soft-deleted.
    pub purge_on_delete: bool,
    pub purge_batch_size: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            storage: StorageConfig::default(),
            upload: UploadPolicy::default(),
            thumbnail: ThumbnailConfig::default(),
            share: ShareLinkPolicy::default(),
            database: DatabaseConfig::default(),
            direct_url_ttl_secs: DIRECT_URL_TTL_SECS,
            purge_on_delete: true,
            purge_batch_size: PURGE_BATCH_SIZE,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes the process environment.
    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let backend = match var("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let storage = StorageConfig {
            backend,
            local_storage_path: var("LOCAL_STORAGE_PATH").unwrap_or_else(|| "./media".to_string()),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|| "/media".to_string()),
            s3_bucket: var("S3_BUCKET").filter(|s| !s.is_empty()),
            s3_region: var("S3_REGION")
                .or_else(|| var("AWS_REGION"))
                .filter(|s| !s.is_empty()),
            s3_endpoint: var("S3_ENDPOINT").filter(|s| !s.is_empty()),
            aws_access_key_id: var("AWS_ACCESS_KEY_ID").filter(|s| !s.is_empty()),
            aws_secret_access_key: var("AWS_SECRET_ACCESS_KEY").filter(|s| !s.is_empty()),
            s3_request_timeout_secs: var("S3_REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(S3_REQUEST_TIMEOUT_SECS),
            s3_connect_timeout_secs: var("S3_CONNECT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(S3_CONNECT_TIMEOUT_SECS),
        };

        let max_file_size_mb = var("MAX_FILE_SIZE_MB")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(MAX_FILE_SIZE_MB);

        let max_file_size_bytes = max_file_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                anyhow::anyhow!("MAX_FILE_SIZE_MB is too large: {}", max_file_size_mb)
            })?;

        let upload = UploadPolicy {
            max_file_size_bytes,
            allowed_content_types: split_list(
                &var("ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|| DEFAULT_ALLOWED_CONTENT_TYPES.to_string()),
            ),
        };

        let thumbnail = ThumbnailConfig {
            max_dimension: var("THUMBNAIL_MAX_DIMENSION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(THUMBNAIL_MAX_DIMENSION),
            quality: var("THUMBNAIL_QUALITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(THUMBNAIL_QUALITY),
        };

        let share = ShareLinkPolicy {
            durations: parse_duration_choices(
                &var("SHARE_LINK_DURATIONS")
                    .unwrap_or_else(|| DEFAULT_SHARE_LINK_DURATIONS.to_string()),
            )?,
            default_choice: var("SHARE_LINK_DEFAULT_DURATION")
                .unwrap_or_else(|| DEFAULT_SHARE_LINK_DURATION.to_string()),
            token_bytes: var("SHARE_TOKEN_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(SHARE_TOKEN_BYTES),
        };

        let database = DatabaseConfig {
            url: var("DATABASE_URL").filter(|s| !s.is_empty()),
            max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            timeout_seconds: var("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
        };

        let config = Config {
            environment,
            storage,
            upload,
            thumbnail,
            share,
            database,
            direct_url_ttl_secs: var("DIRECT_URL_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DIRECT_URL_TTL_SECS),
            purge_on_delete: var("PURGE_ON_DELETE")
                .map(|s| s.to_lowercase())
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            purge_batch_size: var("PURGE_BATCH_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(PURGE_BATCH_SIZE),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.storage.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must not be empty when using local storage backend"
                    ));
                }
            }
        }

        if self.upload.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }

        if self.upload.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_CONTENT_TYPES must not be empty"));
        }

        if self.thumbnail.max_dimension == 0 {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_MAX_DIMENSION must be greater than zero"
            ));
        }

        if !(1..=100).contains(&self.thumbnail.quality) {
            return Err(anyhow::anyhow!("THUMBNAIL_QUALITY must be between 1 and 100"));
        }

        if self.share.token_bytes < MIN_SHARE_TOKEN_BYTES {
            return Err(anyhow::anyhow!(
                "SHARE_TOKEN_BYTES must be at least {} (128 bits)",
                MIN_SHARE_TOKEN_BYTES
            ));
        }

        if self.share.lookup(&self.share.default_choice).is_none() {
            return Err(anyhow::anyhow!(
                "SHARE_LINK_DEFAULT_DURATION '{}' is not one of SHARE_LINK_DURATIONS",
                self.share.default_choice
            ));
        }

        if self.purge_batch_size <= 0 {
            return Err(anyhow::anyhow!("PURGE_BATCH_SIZE must be greater than zero"));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    // Convenience getters for common fields
    pub fn storage_backend(&self) -> StorageBackend {
        self.storage.backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.storage.s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.storage.s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.storage.s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> &str {
        &self.storage.local_storage_path
    }

    pub fn local_storage_base_url(&self) -> &str {
        &self.storage.local_storage_base_url
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_deref()
    }

    pub fn direct_url_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.direct_url_ttl_secs)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `label=seconds` pairs, e.g. `1h=3600,24h=86400`.
pub fn parse_duration_choices(value: &str) -> Result<Vec<(String, i64)>, anyhow::Error> {
    let mut choices = Vec::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (label, secs) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid share duration entry '{}'", pair))?;
        let secs: i64 = secs
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid seconds in share duration entry '{}'", pair))?;
        if secs <= 0 {
            return Err(anyhow::anyhow!(
                "Share duration '{}' must be positive",
                label.trim()
            ));
        }
        choices.push((label.trim().to_string(), secs));
    }

    if choices.is_empty() {
        return Err(anyhow::anyhow!("SHARE_LINK_DURATIONS must not be empty"));
    }

    Ok(choices)
}
