//! # Artifact Storage
//!
//! The blob-store seam. Archive bytes (and the thin manifest, when present)
//! are stored under keys derived from (project id, version); the store
//! implementation is a collaborator behind the [`ArtifactStore`] trait.
//!
//! `put` must be safely retryable: a retried put under the same key can never
//! leave divergent blobs behind. `delete` is idempotent on missing keys.

pub mod local;
pub mod memory;

pub use local::LocalArtifactStore;
pub use memory::InMemoryArtifactStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a key points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Archive,
    Manifest,
}

/// A fully-qualified blob key: one project version owns at most one archive
/// blob and one manifest blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub project_id: i64,
    pub version: i64,
    pub kind: ArtifactKind,
}

impl ArtifactKey {
    pub fn archive(project_id: i64, version: i64) -> Self {
        Self {
            project_id,
            version,
            kind: ArtifactKind::Archive,
        }
    }

    pub fn manifest(project_id: i64, version: i64) -> Self {
        Self {
            project_id,
            version,
            kind: ArtifactKind::Manifest,
        }
    }

    /// Stable object name used by stores and recorded on the resolved
    /// version row.
    pub fn object_name(&self) -> String {
        let leaf = match self.kind {
            ArtifactKind::Archive => "archive.zip",
            ArtifactKind::Manifest => "startup-dependencies.json",
        };
        format!("{}/{}/{}", self.project_id, self.version, leaf)
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.object_name())
    }
}

/// Error type for artifact storage operations.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactStoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Blob-store collaborator contract.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> Result<(), ArtifactStoreError>;

    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, ArtifactStoreError>;

    /// Delete the given keys. Missing keys are not an error.
    async fn delete(&self, keys: &[ArtifactKey]) -> Result<(), ArtifactStoreError>;
}
