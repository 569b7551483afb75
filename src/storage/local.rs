use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::AppError;
use crate::storage::{sanitize_object_name, ObjectStore};

/// Buckets are directories under `root`; blobs are served from
/// `<public_url>/files/<bucket>/<name>`.
pub struct LocalObjectStore {
    root: PathBuf,
    public_url: String,
}

impl LocalObjectStore {
    pub async fn new(root: impl Into<PathBuf>, public_url: &str) -> Result<Self, AppError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        Ok(LocalObjectStore {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, AppError> {
        let bucket = sanitize_object_name(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf, AppError> {
        let name = sanitize_object_name(name)?;
        Ok(self.bucket_path(bucket)?.join(name))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), AppError> {
        fs::create_dir_all(self.bucket_path(bucket)?).await?;
        Ok(())
    }

    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), AppError> {
        self.ensure_bucket(bucket).await?;
        let path = self.object_path(bucket, name)?;
        fs::write(&path, bytes).await?;
        tracing::debug!("📦 Stored {}", path.display());
        Ok(())
    }

    async fn remove(&self, bucket: &str, name: &str) -> Result<(), AppError> {
        match fs::remove_file(self.object_path(bucket, name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), AppError> {
        match fs::remove_dir_all(self.bucket_path(bucket)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, bucket: &str, name: &str) -> String {
        format!("{}/files/{}/{}", self.public_url, bucket, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("chat-store-{}-{}", tag, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_put_and_remove_bucket() {
        let root = scratch_dir("bucket");
        let store = LocalObjectStore::new(&root, "http://localhost:3000/").await.unwrap();

        store.put("9-message", "notes.txt", b"hello".to_vec()).await.unwrap();
        let stored = fs::read(root.join("9-message").join("notes.txt")).await.unwrap();
        assert_eq!(stored, b"hello");

        assert_eq!(
            store.public_url("9-message", "notes.txt"),
            "http://localhost:3000/files/9-message/notes.txt"
        );

        store.remove_bucket("9-message").await.unwrap();
        assert!(!root.join("9-message").exists());
        // Removing again is a no-op.
        store.remove_bucket("9-message").await.unwrap();

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_names_cannot_escape_root() {
        let root = scratch_dir("escape");
        let store = LocalObjectStore::new(&root, "http://localhost").await.unwrap();

        store.put("pfp", "../../outside.png", vec![1, 2, 3]).await.unwrap();
        assert!(root.join("pfp").join("outside.png").exists());

        fs::remove_dir_all(&root).await.unwrap();
    }
}
