//! # Retention Reaper
//!
//! Removes project versions that have aged out of the retention window and
//! are not referenced by any unfinished execution. Best-effort by contract:
//! the caller downgrades failures to warnings, so a reap can never fail or
//! roll back the upload that triggered it.

use crate::error::{Result, UploadError};
use crate::metadata::MetadataStore;
use crate::models::project::{AuditEvent, AuditEventKind};
use crate::storage::{ArtifactKey, ArtifactStore};
use crate::tracker::ExecutionTracker;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct RetentionReaper {
    metadata: Arc<dyn MetadataStore>,
    artifacts: Arc<dyn ArtifactStore>,
    tracker: Arc<dyn ExecutionTracker>,
    /// Trailing number of versions to preserve.
    window: i64,
}

impl RetentionReaper {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        artifacts: Arc<dyn ArtifactStore>,
        tracker: Arc<dyn ExecutionTracker>,
        window: i64,
    ) -> Self {
        Self {
            metadata,
            artifacts,
            tracker,
            window,
        }
    }

    /// Delete unprotected versions below `latest - window`. Returns how many
    /// versions were removed. Idempotent: a second run over the same state
    /// removes nothing.
    #[instrument(skip(self))]
    pub async fn reap(&self, project_id: i64) -> Result<usize> {
        let latest = self
            .metadata
            .get_latest_project_version(project_id)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?;
        let floor = latest - self.window;
        if floor <= 0 {
            return Ok(0);
        }

        let protected: BTreeSet<i64> = self
            .tracker
            .fetch_unfinished_executions()
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?
            .into_iter()
            .filter(|e| e.project_id == project_id)
            .map(|e| e.version)
            .collect();

        let candidates: Vec<i64> = self
            .metadata
            .list_resolved_versions(project_id)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?
            .into_iter()
            .filter(|v| *v < floor && !protected.contains(v))
            .collect();

        if candidates.is_empty() {
            debug!(project_id, floor, "nothing to reap");
            return Ok(0);
        }

        // Blobs first: a version row without blobs is harmless garbage, a
        // blob without a row would leak forever.
        let mut keys = Vec::with_capacity(candidates.len() * 2);
        for version in &candidates {
            keys.push(ArtifactKey::archive(project_id, *version));
            keys.push(ArtifactKey::manifest(project_id, *version));
        }
        self.artifacts
            .delete(&keys)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?;

        self.metadata
            .delete_versions(project_id, &candidates)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?;

        let event = AuditEvent::now(
            project_id,
            AuditEventKind::Purged,
            "retention-reaper",
            format!(
                "Removed versions below {floor}: {}",
                candidates
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        );
        if let Err(e) = self.metadata.post_audit_event(&event).await {
            warn!(project_id, error = %e, "could not record purge event");
        }

        info!(project_id, removed = candidates.len(), floor, "reaped old versions");
        Ok(candidates.len())
    }

    /// The upload pipeline's entry point: failures are demoted to warnings.
    pub async fn reap_best_effort(&self, project_id: i64) -> usize {
        match self.reap(project_id).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(project_id, error = %e, "retention reap failed; continuing");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{InMemoryMetadataStore, MetadataStore};
    use crate::models::execution::ExecutionReference;
    use crate::models::project::ProjectVersionRow;
    use crate::storage::InMemoryArtifactStore;
    use crate::tracker::InMemoryExecutionTracker;

    async fn seed_versions(
        metadata: &InMemoryMetadataStore,
        artifacts: &InMemoryArtifactStore,
        project_id: i64,
        count: i64,
    ) {
        for version in 1..=count {
            metadata
                .insert_pending_version(&ProjectVersionRow::pending(
                    project_id, version, "alice", "demo.zip",
                ))
                .await
                .unwrap();
            metadata
                .resolve_version(project_id, version, "key", "hash", "alice", "demo.zip")
                .await
                .unwrap();
            artifacts
                .put(&ArtifactKey::archive(project_id, version), vec![1])
                .await
                .unwrap();
        }
    }

    fn reaper(
        metadata: Arc<InMemoryMetadataStore>,
        artifacts: Arc<InMemoryArtifactStore>,
        tracker: Arc<InMemoryExecutionTracker>,
        window: i64,
    ) -> RetentionReaper {
        RetentionReaper::new(metadata, artifacts, tracker, window)
    }

    #[tokio::test]
    async fn reaps_below_floor_only() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let tracker = Arc::new(InMemoryExecutionTracker::new());
        let project = metadata.create_project("demo", "alice").await.unwrap();
        seed_versions(&metadata, &artifacts, project.id, 5).await;

        // latest 5, window 2 -> floor 3 -> versions 1, 2 go.
        let removed = reaper(metadata.clone(), artifacts.clone(), tracker, 2)
            .reap(project.id)
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            metadata.list_resolved_versions(project.id).await.unwrap(),
            vec![3, 4, 5]
        );
        assert!(!artifacts.contains(&ArtifactKey::archive(project.id, 1)));
        assert!(artifacts.contains(&ArtifactKey::archive(project.id, 3)));
    }

    #[tokio::test]
    async fn running_execution_pins_its_version() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let tracker = Arc::new(InMemoryExecutionTracker::new());
        let project = metadata.create_project("demo", "alice").await.unwrap();
        seed_versions(&metadata, &artifacts, project.id, 5).await;

        tracker.start(ExecutionReference {
            execution_id: 99,
            project_id: project.id,
            version: 1,
        });

        let removed = reaper(metadata.clone(), artifacts.clone(), tracker.clone(), 2)
            .reap(project.id)
            .await
            .unwrap();
        assert_eq!(removed, 1); // only version 2
        assert_eq!(
            metadata.list_resolved_versions(project.id).await.unwrap(),
            vec![1, 3, 4, 5]
        );

        // Once the execution finishes, the pinned version becomes reapable.
        tracker.finish(99);
        let removed = reaper(metadata.clone(), artifacts.clone(), tracker, 2)
            .reap(project.id)
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn second_run_is_a_noop() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let tracker = Arc::new(InMemoryExecutionTracker::new());
        let project = metadata.create_project("demo", "alice").await.unwrap();
        seed_versions(&metadata, &artifacts, project.id, 5).await;

        let r = reaper(metadata, artifacts, tracker, 2);
        assert_eq!(r.reap(project.id).await.unwrap(), 2);
        assert_eq!(r.reap(project.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn young_project_is_untouched() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let tracker = Arc::new(InMemoryExecutionTracker::new());
        let project = metadata.create_project("demo", "alice").await.unwrap();
        seed_versions(&metadata, &artifacts, project.id, 2).await;

        let r = reaper(metadata, artifacts, tracker, 3);
        assert_eq!(r.reap(project.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn other_projects_executions_do_not_pin() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let tracker = Arc::new(InMemoryExecutionTracker::new());
        let project = metadata.create_project("demo", "alice").await.unwrap();
        seed_versions(&metadata, &artifacts, project.id, 4).await;

        tracker.start(ExecutionReference {
            execution_id: 1,
            project_id: project.id + 1000,
            version: 1,
        });

        let r = reaper(metadata, artifacts, tracker, 2);
        assert_eq!(r.reap(project.id).await.unwrap(), 2);
    }
}
