//! Shared key generation for storage backends.
//!
//! Key format: `files/{owner_id}/{uuid}{.ext}` for originals and
//! `thumbnails/{owner_id}/{uuid}{.ext}` for derived thumbnails.

use uuid::Uuid;

pub const FILES_PREFIX: &str = "files/";
pub const THUMBNAILS_PREFIX: &str = "thumbnails/";

const MAX_EXTENSION_LEN: usize = 10;

/// Generate a storage key for the given owner and user-supplied filename.
///
/// The random UUID is the only part that makes keys unique; the filename contributes
/// nothing but its (sanitized, lower-cased) extension.
pub fn generate_storage_key(owner_id: Uuid, filename: &str) -> String {
    let extension = extension_of(filename)
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    format!("{}{}/{}{}", FILES_PREFIX, owner_id, Uuid::new_v4(), extension)
}

/// Thumbnail key for an original's key, or `None` if the key is not an original.
pub fn thumbnail_key(storage_key: &str) -> Option<String> {
    storage_key
        .strip_prefix(FILES_PREFIX)
        .map(|rest| format!("{}{}", THUMBNAILS_PREFIX, rest))
}

/// Lower-cased extension of the last path component, without the dot.
///
/// Dotfiles (`.bashrc`) have no extension. Anything that is not short ASCII alphanumeric is
/// dropped rather than cleaned up.
pub fn extension_of(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
