use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::storage::ObjectStore;

/// In-process store; blobs vanish with the process.
#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, bucket: &str, name: &str) -> Option<Vec<u8>> {
        let buckets = self.buckets.read().await;
        buckets.get(bucket)?.get(name).cloned()
    }

    pub async fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.read().await.contains_key(bucket)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), AppError> {
        let mut buckets = self.buckets.write().await;
        buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), AppError> {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(name.to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, bucket: &str, name: &str) -> Result<(), AppError> {
        let mut buckets = self.buckets.write().await;
        if let Some(objects) = buckets.get_mut(bucket) {
            objects.remove(name);
        }
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), AppError> {
        self.buckets.write().await.remove(bucket);
        Ok(())
    }

    fn public_url(&self, bucket: &str, name: &str) -> String {
        format!("memory://{}/{}", bucket, name)
    }
}
