//! In-memory artifact store for tests and embedded use.

use super::{ArtifactKey, ArtifactStore, ArtifactStoreError};
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryArtifactStore {
    blobs: DashMap<ArtifactKey, Vec<u8>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.blobs.contains_key(key)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> Result<(), ArtifactStoreError> {
        self.blobs.insert(*key, bytes);
        Ok(())
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, ArtifactStoreError> {
        self.blobs
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ArtifactStoreError::NotFound(key.object_name()))
    }

    async fn delete(&self, keys: &[ArtifactKey]) -> Result<(), ArtifactStoreError> {
        for key in keys {
            self.blobs.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn behaves_like_a_store() {
        let store = InMemoryArtifactStore::new();
        let key = ArtifactKey::archive(1, 1);

        assert!(store.is_empty());
        assert_ok!(store.put(&key, vec![1, 2, 3]).await);
        assert_eq!(store.get(&key).await.unwrap(), vec![1, 2, 3]);
        assert_ok!(store.delete(&[key]).await);
        assert_ok!(store.delete(&[key]).await);
        assert!(store.is_empty());
    }
}
