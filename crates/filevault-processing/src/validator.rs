use filevault_core::{AppError, UploadPolicy};

/// Upload policy checks
///
/// Each check maps to one rejection kind so the orchestrator can run them in order and stop
/// at the first failure: size, then declared type, then sniffed type.
#[derive(Clone, Debug)]
pub struct UploadValidator {
    max_file_size: u64,
    allowed_content_types: Vec<String>,
}

impl UploadValidator {
    pub fn new(max_file_size: u64, allowed_content_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_content_types: allowed_content_types
                .iter()
                .map(|ct| normalize_content_type(ct))
                .collect(),
        }
    }

    pub fn from_policy(policy: &UploadPolicy) -> Self {
        Self::new(
            policy.max_file_size_bytes,
            policy.allowed_content_types.clone(),
        )
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn is_allowed(&self, content_type: &str) -> bool {
        let normalized = normalize_content_type(content_type);
        self.allowed_content_types.iter().any(|ct| ct == &normalized)
    }

    /// Validate file size
    pub fn validate_size(&self, size: u64) -> Result<(), AppError> {
        if size > self.max_file_size {
            return Err(AppError::TooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Validate the client-declared content type
    pub fn validate_declared_type(&self, content_type: &str) -> Result<(), AppError> {
        if !self.is_allowed(content_type) {
            return Err(AppError::UnsupportedType(content_type.to_string()));
        }
        Ok(())
    }

    /// Validate the type detected from the payload's leading bytes
    ///
    /// The detected type only has to be on the allow-list; it may differ from the declared
    /// one (a PNG declared as `image/jpeg` is still an allowed image).
    pub fn validate_sniffed_type(&self, declared: &str, detected: &str) -> Result<(), AppError> {
        if !self.is_allowed(detected) {
            tracing::warn!(
                declared = %declared,
                detected = %detected,
                "Upload content does not match an allowed type"
            );
            return Err(AppError::ContentMismatch {
                declared: declared.to_string(),
                detected: detected.to_string(),
            });
        }
        Ok(())
    }
}

/// Lower-case a MIME type and drop any parameters (`text/plain; charset=utf-8` → `text/plain`).
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Content type conventionally associated with a file extension.
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    let content_type = match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        // Documents
        "pdf" => "application/pdf",
        "txt" | "text" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => return None,
    };
    Some(content_type)
}
