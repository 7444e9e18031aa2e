use super::file::UploadFile;

/// Reasons a file is refused before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("please choose a valid image file (got {content_type:?})")]
    NotAnImage { content_type: String },
    #[error("file is too large ({size} bytes); choose one under {limit_mb} MB")]
    TooLarge { size: u64, limit_mb: u64 },
}

/// Declared type must be `image/*`; a file of exactly `max_bytes` passes.
pub fn validate_upload(file: &UploadFile, max_bytes: u64) -> Result<(), UploadRejection> {
    if !file.content_type.starts_with("image/") {
        return Err(UploadRejection::NotAnImage {
            content_type: file.content_type.clone(),
        });
    }
    if file.len() > max_bytes {
        return Err(UploadRejection::TooLarge {
            size: file.len(),
            limit_mb: max_bytes / (1024 * 1024),
        });
    }
    Ok(())
}
