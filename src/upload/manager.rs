//! # Upload Manager
//!
//! The pipeline facade: extract → detect format → validate (re-serializing
//! the archive if a validator mutated the directory) → load flow graphs →
//! gate on aggregate status → commit under the per-project lock → reap old
//! versions.
//!
//! Validation and loading run unlocked and may overlap across concurrent
//! uploads to the same project; only the commit phase serializes. The
//! configured deadline covers everything before the commit phase; once the
//! commit begins it is never cancelled.

use crate::archive::{detect, extract_archive, pack_directory, ArchiveKind};
use crate::config::FlowVaultConfig;
use crate::error::{Result, UploadError};
use crate::loader;
use crate::loader::LoadedFlows;
use crate::metadata::MetadataStore;
use crate::models::project::Project;
use crate::models::validation::{
    is_acceptable, requires_repack, ReportMap, FLOW_STRUCTURE_REPORT_KEY,
};
use crate::storage::ArtifactStore;
use crate::tracker::ExecutionTracker;
use crate::upload::committer::{ArtifactPersister, CommitRequest};
use crate::upload::lock::ProjectLockMap;
use crate::upload::reaper::RetentionReaper;
use crate::validation::{
    ThinManifestValidator, Validator, ValidatorChain, ValidatorContext, ValidatorRegistry,
};
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// One upload submission.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub project_id: i64,
    pub archive_name: String,
    pub archive_bytes: Vec<u8>,
    /// Declared container format; only "zip" is supported.
    pub declared_format: String,
    pub uploader: String,
    /// Free-form properties handed to every validator.
    pub props: BTreeMap<String, String>,
}

/// Result of an upload. Rejection is a normal outcome, not an error: the
/// caller gets the full report map either way.
#[derive(Debug)]
pub enum UploadOutcome {
    Accepted { version: i64, reports: ReportMap },
    Rejected { reports: ReportMap },
}

impl UploadOutcome {
    pub fn reports(&self) -> &ReportMap {
        match self {
            UploadOutcome::Accepted { reports, .. } => reports,
            UploadOutcome::Rejected { reports } => reports,
        }
    }

    pub fn version(&self) -> Option<i64> {
        match self {
            UploadOutcome::Accepted { version, .. } => Some(*version),
            UploadOutcome::Rejected { .. } => None,
        }
    }
}

/// Product of the unlocked staging phase.
struct StagedUpload {
    reports: ReportMap,
    loaded: LoadedFlows,
    archive_bytes: Vec<u8>,
    manifest_bytes: Option<Vec<u8>>,
}

pub struct UploadManager {
    config: FlowVaultConfig,
    metadata: Arc<dyn MetadataStore>,
    persister: Arc<ArtifactPersister>,
    reaper: RetentionReaper,
    chain: Vec<Arc<dyn Validator>>,
    thin_validator: Arc<dyn Validator>,
    locks: ProjectLockMap,
}

impl UploadManager {
    /// Assemble the pipeline. Fails fast if the configured validator order
    /// names an unregistered validator.
    pub fn new(
        config: FlowVaultConfig,
        metadata: Arc<dyn MetadataStore>,
        artifacts: Arc<dyn ArtifactStore>,
        tracker: Arc<dyn ExecutionTracker>,
        registry: &ValidatorRegistry,
    ) -> Result<Self> {
        let chain =
            ValidatorChain::from_registry(registry, &config.validator_order)?.into_validators();
        let persister = Arc::new(ArtifactPersister::new(metadata.clone(), artifacts.clone()));
        let reaper = RetentionReaper::new(
            metadata.clone(),
            artifacts,
            tracker,
            config.retention_window,
        );
        Ok(Self {
            config,
            metadata,
            persister,
            reaper,
            chain,
            thin_validator: Arc::new(ThinManifestValidator),
            locks: ProjectLockMap::new(),
        })
    }

    /// Convenience passthrough for library users bootstrapping a project.
    pub async fn create_project(&self, name: &str, actor: &str) -> Result<Project> {
        self.metadata
            .create_project(name, actor)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))
    }

    /// Run the full upload pipeline for one submission.
    #[instrument(skip(self, request), fields(project_id = request.project_id, archive = %request.archive_name))]
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome> {
        let project = self
            .metadata
            .fetch_project(request.project_id)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?;

        info!(project = %project.name, uploader = %request.uploader, "upload started");

        let StagedUpload {
            reports,
            loaded,
            archive_bytes,
            manifest_bytes,
        } = self.stage_with_deadline(&project, &request).await?;

        if !is_acceptable(&reports) {
            info!(project = %project.name, "upload rejected by validation");
            return Ok(UploadOutcome::Rejected { reports });
        }

        // The commit runs on its own task with owned data: dropping this
        // future past this point cannot cancel a commit in flight.
        let project_id = project.id;
        let project_name = project.name.clone();
        let lock = self.locks.lock_for(project_id);
        let persister = self.persister.clone();
        let commit = CommitRequest {
            project,
            loaded,
            archive_bytes,
            manifest_bytes,
            archive_name: request.archive_name.clone(),
            uploader: request.uploader.clone(),
        };
        let version = tokio::spawn(async move {
            let _guard = lock.lock().await;
            persister.commit(&commit).await
        })
        .await
        .map_err(|e| UploadError::Persistence(format!("commit task failed: {e}")))??;

        // Best-effort cleanup outside the lock; never fails the upload.
        let reaped = self.reaper.reap_best_effort(project_id).await;
        if reaped > 0 {
            info!(project = %project_name, reaped, "old versions reaped after upload");
        }

        Ok(UploadOutcome::Accepted { version, reports })
    }

    async fn stage_with_deadline(
        &self,
        project: &Project,
        request: &UploadRequest,
    ) -> Result<StagedUpload> {
        let deadline = self.config.upload_deadline();
        match deadline {
            Some(limit) => match timeout(limit, self.stage(project, request)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(project = %project.name, ?limit, "staging deadline exceeded");
                    Err(UploadError::DeadlineExceeded(limit))
                }
            },
            None => self.stage(project, request).await,
        }
    }

    /// The unlocked phase: extraction, validation, conditional re-pack, flow
    /// loading. The scratch directory lives exactly as long as this call.
    async fn stage(&self, project: &Project, request: &UploadRequest) -> Result<StagedUpload> {
        let scratch = extract_archive(
            &request.archive_bytes,
            &request.declared_format,
            &self.config.scratch_dir,
        )?;

        let kind = detect(scratch.path());

        let mut validators = Vec::with_capacity(self.chain.len() + 1);
        if kind.is_thin() {
            validators.push(self.thin_validator.clone());
        }
        validators.extend(self.chain.iter().cloned());
        let chain = ValidatorChain::new(validators);

        let ctx = ValidatorContext {
            project,
            dir: scratch.path(),
            manifest_path: kind.manifest_path(),
            props: &request.props,
        };
        let mut reports = chain.run(&ctx).await?;

        // The stored artifact must reflect the post-validation directory.
        let archive_bytes = if requires_repack(&reports) {
            info!(project = %project.name, "validators mutated the directory; re-packing archive");
            pack_directory(scratch.path())?
        } else {
            request.archive_bytes.clone()
        };

        // Manifest bytes are re-read after validation for the same reason.
        let manifest_bytes = match kind {
            ArchiveKind::Thin { ref manifest_path } => Some(fs::read(manifest_path)?),
            ArchiveKind::Fat => None,
        };

        let loaded = loader::load(project, scratch.path())?;
        reports.insert(FLOW_STRUCTURE_REPORT_KEY.to_string(), loaded.report.clone());

        Ok(StagedUpload {
            reports,
            loaded,
            archive_bytes,
            manifest_bytes,
        })
    }
}
