//! Filevault Processing Library
//!
//! Content inspection and image derivation for uploads: magic-byte sniffing, upload policy
//! checks and thumbnail rendering. CPU-bound work runs on the blocking pool.

pub mod sniff;
pub mod thumbnail;
pub mod validator;

pub use sniff::{sniff, SNIFF_LEN};
pub use thumbnail::ThumbnailDeriver;
pub use validator::{content_type_for_extension, normalize_content_type, UploadValidator};
