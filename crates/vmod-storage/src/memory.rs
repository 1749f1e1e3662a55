//! In-process object store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectInfo, ObjectStore};

type Objects = BTreeMap<(String, String), Vec<u8>>;

/// [`ObjectStore`] held in a shared map. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<Objects>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, Objects> {
        // A panic while holding the lock leaves the map itself intact
        self.objects.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Seed an object.
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.objects()
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    /// Every key in `bucket`, in order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        Ok(self
            .objects()
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), v)| ObjectInfo {
                key: k.clone(),
                size: v.len() as u64,
            })
            .collect())
    }

    async fn get_bytes(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        self.objects()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }

    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<()> {
        self.insert(bucket, key, data);
        Ok(())
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        _content_type: &str,
    ) -> StorageResult<()> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?;
        self.insert(bucket, key, data);
        Ok(())
    }

    async fn download_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()> {
        let data = self.get_bytes(bucket, key).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.objects()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_is_scoped_to_bucket_and_prefix() {
        let store = MemoryStore::new();
        store.insert("a", "f/v.mp4/0.png", b"x".to_vec());
        store.insert("a", "f/v.mp4/1000.json", b"{}".to_vec());
        store.insert("a", "f/other.mp4/0.png", b"x".to_vec());
        store.insert("b", "f/v.mp4/0.png", b"x".to_vec());

        let keys: Vec<String> = store
            .list("a", "f/v.mp4/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["f/v.mp4/0.png", "f/v.mp4/1000.json"]);
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let store = MemoryStore::new();
        store.insert("a", "p/1.png", b"x".to_vec());
        store.insert("a", "p/2.png", b"x".to_vec());
        store.insert("a", "q/1.png", b"x".to_vec());

        assert_eq!(store.delete_prefix("a", "p/").await.unwrap(), 2);
        assert_eq!(store.keys("a"), vec!["q/1.png"]);

        // Missing keys are fine
        store.delete("a", "p/1.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in.png");
        tokio::fs::write(&src, b"frame").await.unwrap();

        let store = MemoryStore::new();
        store.upload_file("b", "k.png", &src, "image/png").await.unwrap();

        let dst = dir.path().join("nested/out.png");
        store.download_file("b", "k.png", &dst).await.unwrap();
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"frame");
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = MemoryStore::new();
        let err = store.get_bytes("b", "nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert!(!err.is_retryable());
    }
}
