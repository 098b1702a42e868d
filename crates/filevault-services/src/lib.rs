//! Filevault Services Layer
//!
//! The business service layer: the storage orchestrator that turns an upload stream into a
//! stored object plus thumbnail, and the owner-facing file, share-link and purge services
//! built on top of it and the metadata repositories. Transport layers (HTTP handlers, the
//! CLI) call into these services and nothing below them.

pub mod files;
pub mod purge;
pub mod share;
pub mod storage;

pub use files::{Download, FileService, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use purge::{PurgeReport, PurgeService};
pub use share::{generate_token, ShareLinkService, SharedDownload};
pub use storage::{display_name, StorageOrchestrator, UploadRequest};

pub use filevault_storage::{
    create_storage, ByteReader, ByteStream, DirectUrl, Storage, StorageBackend, StorageError,
    StorageResult,
};
