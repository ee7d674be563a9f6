//! Filesystem-backed artifact store.
//!
//! Writes go to a uniquely named temp file in the target directory followed
//! by an atomic rename, so a retried `put` under the same key replaces the
//! blob wholesale and concurrent readers never observe a torn write.

use super::{ArtifactKey, ArtifactStore, ArtifactStoreError};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.object_name())
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> Result<(), ArtifactStoreError> {
        let target = self.blob_path(key);
        let parent = target
            .parent()
            .ok_or_else(|| ArtifactStoreError::Backend(format!("keyless path for {key}")))?;
        fs::create_dir_all(parent).await?;

        let staging = parent.join(format!(".staged-{}", Uuid::new_v4()));
        fs::write(&staging, &bytes).await?;
        fs::rename(&staging, &target).await?;

        debug!(key = %key, bytes = bytes.len(), "stored artifact");
        Ok(())
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, ArtifactStoreError> {
        let target = self.blob_path(key);
        match fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactStoreError::NotFound(key.object_name()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, keys: &[ArtifactKey]) -> Result<(), ArtifactStoreError> {
        for key in keys {
            match fs::remove_file(self.blob_path(key)).await {
                Ok(()) => debug!(key = %key, "deleted artifact"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_get_round_trip() {
        let root = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(root.path());
        let key = ArtifactKey::archive(1, 1);

        store.put(&key, b"archive bytes".to_vec()).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"archive bytes");
    }

    #[tokio::test]
    async fn retried_put_replaces_the_blob() {
        let root = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(root.path());
        let key = ArtifactKey::archive(1, 1);

        store.put(&key, b"first".to_vec()).await.unwrap();
        store.put(&key, b"second".to_vec()).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"second");

        // No staging leftovers beside the blob.
        let dir = root.path().join("1/1");
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".staged-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn get_of_missing_key_is_not_found() {
        let root = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(root.path());
        let err = store.get(&ArtifactKey::archive(9, 9)).await.unwrap_err();
        assert!(matches!(err, ArtifactStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent_on_missing_keys() {
        let root = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(root.path());
        let key = ArtifactKey::manifest(2, 5);

        store.delete(&[key]).await.unwrap();
        store.put(&key, b"{}".to_vec()).await.unwrap();
        store.delete(&[key]).await.unwrap();
        store.delete(&[key]).await.unwrap();
        assert!(matches!(
            store.get(&key).await.unwrap_err(),
            ArtifactStoreError::NotFound(_)
        ));
    }
}
