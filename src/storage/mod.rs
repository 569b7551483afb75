//! Blob storage for profile pictures and message attachments.
//!
//! Blobs live under named buckets: `<messageId>-message` for attachments
//! (one `<attachmentId>-<fileName>` object each), [`USER_PFP_BUCKET`] and
//! [`GROUP_PFP_BUCKET`] for profile pictures.

pub mod local;
pub mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use async_trait::async_trait;

use crate::error::AppError;

pub const USER_PFP_BUCKET: &str = "pfp";
pub const GROUP_PFP_BUCKET: &str = "groups-pfp";

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Creates the bucket if it does not exist yet.
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), AppError>;

    /// Writes `bytes` under `bucket/name`, replacing any previous blob.
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), AppError>;

    async fn remove(&self, bucket: &str, name: &str) -> Result<(), AppError>;

    /// Removes the bucket and everything in it. Missing buckets are not an error.
    async fn remove_bucket(&self, bucket: &str) -> Result<(), AppError>;

    fn public_url(&self, bucket: &str, name: &str) -> String;
}

pub fn message_bucket(message_id: i64) -> String {
    format!("{}-message", message_id)
}

/// Attachment blobs are keyed by row so uploads sharing a file name stay apart.
pub fn attachment_object_name(attachment_id: i64, file_name: &str) -> String {
    format!("{}-{}", attachment_id, file_name)
}

/// Profile pictures are stored as `<ownerId>.<ext>`.
pub fn picture_name(owner_id: i64, extension: &str) -> String {
    format!("{}.{}", owner_id, extension)
}

/// Reduces an uploaded file name to its final path component with only
/// URL- and filesystem-safe characters.
pub fn sanitize_object_name(raw: &str) -> Result<String, AppError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        return Err(AppError::Validation(format!("Invalid file name: {:?}", raw)));
    }
    Ok(cleaned)
}

/// Lowercased extension of an uploaded file name, if it has a usable one.
pub fn file_extension(raw: &str) -> Option<String> {
    let name = sanitize_object_name(raw).ok()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 10 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_object_name() {
        assert_eq!(sanitize_object_name("photo.png").unwrap(), "photo.png");
        assert_eq!(sanitize_object_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_object_name("C:\\docs\\my file.pdf").unwrap(), "my_file.pdf");
        assert_eq!(sanitize_object_name(".hidden").unwrap(), "hidden");
        assert!(sanitize_object_name("..").is_err());
        assert!(sanitize_object_name("dir/").is_err());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("avatar.JPG").as_deref(), Some("jpg"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("README"), None);
    }

    #[test]
    fn test_bucket_names() {
        assert_eq!(message_bucket(42), "42-message");
        assert_eq!(picture_name(7, "png"), "7.png");
    }
}
