//! Object store seam.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageResult;

/// Information about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
}

/// Bucket-addressed object storage.
///
/// Every call names its bucket: a job may read its source from one bucket
/// and write frames to another.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object under `prefix`, in key order.
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    /// Read an object fully into memory.
    async fn get_bytes(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Write an object from memory.
    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Upload a local file.
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Download an object to a local file, creating parent directories.
    async fn download_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()>;

    /// Delete one object. Deleting a missing key is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Delete a batch of objects, returning how many were requested.
    async fn delete_many(&self, bucket: &str, keys: &[String]) -> StorageResult<u32> {
        for key in keys {
            self.delete(bucket, key).await?;
        }
        Ok(keys.len() as u32)
    }

    /// Delete everything under `prefix`.
    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> StorageResult<u32> {
        let keys: Vec<String> = self
            .list(bucket, prefix)
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect();

        debug!("Purging {} objects under {}/{}", keys.len(), bucket, prefix);
        self.delete_many(bucket, &keys).await
    }
}

/// Content type for the artifacts this pipeline writes.
pub fn content_type_for_key(key: &str) -> &'static str {
    let lower = key.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".json") {
        "application/json"
    } else if lower.ends_with(".mp4") {
        "video/mp4"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for_key("f/v.mp4/0.png"), "image/png");
        assert_eq!(content_type_for_key("f/v.mp4/0.json"), "application/json");
        assert_eq!(content_type_for_key("VID.MP4"), "video/mp4");
        assert_eq!(content_type_for_key("blob"), "application/octet-stream");
    }
}
