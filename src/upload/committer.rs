//! # Version Allocator / Artifact Persister
//!
//! The commit path. Callers must hold the project's keyed lock for the whole
//! call; everything here assumes it is the only writer for this project.
//!
//! Commit protocol:
//!
//! 1. Read the authoritative version pointer and allocate `pointer + 1`,
//!    refusing if an unresolved pending version sits above the pointer
//!    (a crashed earlier commit).
//! 2. Compute per-flow versions (previous + 1, starting at 1).
//! 3. Claim the version with a pending placeholder row.
//! 4. Upload blobs (archive, manifest when Thin).
//! 5. Insert flow records and layout-specific auxiliary records.
//! 6. Resolve the pending row: stamp the artifact key and content hash,
//!    advances the pointer and writes the UPLOADED audit event in a single
//!    store transaction.
//!
//! Readers are pointer-gated, so nothing is visible until step 6 commits.
//! Any failure after step 3 compensates: blobs and all rows for the failed
//! version are deleted before the fault is surfaced, leaving the pointer at
//! exactly the prior state.

use crate::error::{Result, UploadError};
use crate::loader::{FlowLayout, LoadedFlows};
use crate::metadata::MetadataStore;
use crate::models::flow::{FlowFileRow, FlowRecord};
use crate::models::project::{Project, ProjectVersionRow};
use crate::storage::{ArtifactKey, ArtifactStore};
use chrono::Utc;
use futures::future::try_join;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Owned commit input: the commit phase runs on its own task so that a
/// caller dropping the upload future can never cancel it mid-flight.
pub struct CommitRequest {
    pub project: Project,
    pub loaded: LoadedFlows,
    pub archive_bytes: Vec<u8>,
    /// Raw manifest bytes for Thin uploads.
    pub manifest_bytes: Option<Vec<u8>>,
    pub archive_name: String,
    pub uploader: String,
}

pub struct ArtifactPersister {
    metadata: Arc<dyn MetadataStore>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl ArtifactPersister {
    pub fn new(metadata: Arc<dyn MetadataStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            metadata,
            artifacts,
        }
    }

    /// Allocate the next project version and persist the upload atomically.
    /// The caller holds the per-project lock.
    #[instrument(skip_all, fields(project = %request.project.name, uploader = %request.uploader))]
    pub async fn commit(&self, request: &CommitRequest) -> Result<i64> {
        let project_id = request.project.id;

        let latest = self
            .metadata
            .get_latest_project_version(project_id)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?;

        if let Some(row) = self
            .metadata
            .get_latest_allocated_version(project_id)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?
        {
            if row.is_pending() && row.version > latest {
                return Err(UploadError::Persistence(format!(
                    "version {} of project {} is still unresolved; refusing to allocate past it",
                    row.version, project_id
                )));
            }
        }

        let new_version = latest + 1;
        let flow_records = self.allocate_flow_versions(request, new_version).await?;

        let pending = ProjectVersionRow::pending(
            project_id,
            new_version,
            &request.uploader,
            &request.archive_name,
        );
        self.metadata
            .insert_pending_version(&pending)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?;

        debug!(version = new_version, flows = flow_records.len(), "claimed project version");

        let mut blob_keys = vec![ArtifactKey::archive(project_id, new_version)];
        if request.manifest_bytes.is_some() {
            blob_keys.push(ArtifactKey::manifest(project_id, new_version));
        }

        match self
            .persist(request, new_version, &flow_records, &blob_keys)
            .await
        {
            Ok(()) => {
                info!(version = new_version, "upload committed");
                Ok(new_version)
            }
            Err(cause) => {
                self.compensate(project_id, new_version, &blob_keys).await;
                Err(UploadError::Persistence(cause))
            }
        }
    }

    async fn allocate_flow_versions(
        &self,
        request: &CommitRequest,
        new_version: i64,
    ) -> Result<Vec<FlowRecord>> {
        let now = Utc::now();
        let mut records = Vec::with_capacity(request.loaded.flows.len());
        for (flow_id, graph) in &request.loaded.flows {
            let previous = self
                .metadata
                .get_latest_flow_version(request.project.id, flow_id)
                .await
                .map_err(|e| UploadError::Persistence(e.to_string()))?;
            records.push(FlowRecord {
                project_id: request.project.id,
                flow_id: flow_id.clone(),
                flow_version: previous + 1,
                project_version: new_version,
                graph: graph.to_json(),
                created_at: now,
            });
        }
        Ok(records)
    }

    /// Steps 4–6. Returns a failure description; the caller compensates.
    async fn persist(
        &self,
        request: &CommitRequest,
        new_version: i64,
        flow_records: &[FlowRecord],
        blob_keys: &[ArtifactKey],
    ) -> std::result::Result<(), String> {
        let project_id = request.project.id;

        let archive_key = blob_keys[0];
        let archive_put = self.artifacts.put(&archive_key, request.archive_bytes.clone());
        match &request.manifest_bytes {
            Some(manifest_bytes) => {
                try_join(
                    archive_put,
                    self.artifacts.put(&blob_keys[1], manifest_bytes.clone()),
                )
                .await
                .map(|_| ())
                .map_err(|e| format!("artifact upload failed: {e}"))?;
            }
            None => archive_put
                .await
                .map_err(|e| format!("archive upload failed: {e}"))?,
        }

        self.metadata
            .insert_flow_versions(flow_records)
            .await
            .map_err(|e| format!("flow records failed: {e}"))?;

        match request.loaded.layout {
            FlowLayout::Flat => {
                self.metadata
                    .insert_project_properties(
                        project_id,
                        new_version,
                        &request.loaded.properties,
                    )
                    .await
                    .map_err(|e| format!("property records failed: {e}"))?;
            }
            FlowLayout::Hierarchical => {
                let mut rows = Vec::with_capacity(request.loaded.flow_files.len());
                for source in &request.loaded.flow_files {
                    let previous = self
                        .metadata
                        .get_latest_flow_file_version(project_id, new_version, &source.file_name)
                        .await
                        .map_err(|e| format!("flow file version lookup failed: {e}"))?;
                    rows.push(FlowFileRow {
                        project_id,
                        project_version: new_version,
                        file_name: source.file_name.clone(),
                        file_version: previous + 1,
                        content: source.content.clone(),
                    });
                }
                self.metadata
                    .insert_flow_files(&rows)
                    .await
                    .map_err(|e| format!("flow file records failed: {e}"))?;
            }
        }

        let content_hash = sha256_hex(&request.archive_bytes);
        self.metadata
            .resolve_version(
                project_id,
                new_version,
                &archive_key.object_name(),
                &content_hash,
                &request.uploader,
                &request.archive_name,
            )
            .await
            .map_err(|e| format!("version resolution failed: {e}"))
    }

    /// Undo every step of a failed commit. Compensation faults are logged
    /// and swallowed: the pending row left behind (if any) blocks further
    /// allocation instead of corrupting state.
    async fn compensate(&self, project_id: i64, version: i64, blob_keys: &[ArtifactKey]) {
        warn!(project_id, version, "commit failed, compensating");

        if let Err(e) = self.artifacts.delete(blob_keys).await {
            error!(project_id, version, error = %e, "compensation could not delete blobs");
        }
        if let Err(e) = self.metadata.delete_versions(project_id, &[version]).await {
            error!(project_id, version, error = %e, "compensation could not delete version rows");
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
