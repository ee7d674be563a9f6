//! Shared fixtures for the upload pipeline integration suite: archive
//! builders, an assembled in-memory vault, and fault-injecting store
//! wrappers.

#![allow(dead_code)]

use async_trait::async_trait;
use flowvault::config::FlowVaultConfig;
use flowvault::metadata::{InMemoryMetadataStore, MetadataError, MetadataStore};
use flowvault::models::flow::{FlowFileRow, FlowRecord, PropertySetRecord};
use flowvault::models::project::{AuditEvent, Project, ProjectVersionRow};
use flowvault::models::validation::ValidationReport;
use flowvault::storage::{
    ArtifactKey, ArtifactStore, ArtifactStoreError, InMemoryArtifactStore,
};
use flowvault::tracker::InMemoryExecutionTracker;
use flowvault::upload::{UploadManager, UploadRequest};
use flowvault::validation::{Validator, ValidatorContext, ValidatorFault, ValidatorRegistry};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Build a zip archive from (entry name, body) pairs.
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, body) in entries {
        writer.start_file(name.to_string(), options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A Fat flat-layout archive with two independent flows "a" and "b".
pub fn fat_archive_two_flows() -> Vec<u8> {
    zip_archive(&[
        ("a.job", "type=command\ncommand=echo a\n"),
        ("b.job", "type=command\ncommand=echo b\n"),
    ])
}

pub const VALID_THIN_MANIFEST: &str = r#"{"dependencies":[{"group":"com.acme","name":"util","version":"2.0.1","checksum":"9f86d081"}]}"#;

/// Manifest with a dependency missing the required "checksum" field.
pub const INCOMPLETE_THIN_MANIFEST: &str =
    r#"{"dependencies":[{"group":"com.acme","name":"util","version":"2.0.1"}]}"#;

pub fn thin_archive(manifest: &str) -> Vec<u8> {
    zip_archive(&[
        ("a.job", "type=command\ncommand=echo a\n"),
        ("app-meta/startup-dependencies.json", manifest),
    ])
}

/// An assembled pipeline over in-memory collaborators.
pub struct TestVault {
    pub manager: UploadManager,
    pub metadata: Arc<InMemoryMetadataStore>,
    pub artifacts: Arc<InMemoryArtifactStore>,
    pub tracker: Arc<InMemoryExecutionTracker>,
    // Held for its lifetime: the scratch root lives as long as the vault.
    pub scratch_root: TempDir,
}

pub struct VaultOptions {
    pub retention_window: i64,
    pub deadline_secs: u64,
    pub validator_order: Vec<String>,
    pub registry: ValidatorRegistry,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            retention_window: 3,
            deadline_secs: 0,
            validator_order: Vec::new(),
            registry: ValidatorRegistry::new(),
        }
    }
}

pub fn vault() -> TestVault {
    vault_with(VaultOptions::default())
}

pub fn vault_with(options: VaultOptions) -> TestVault {
    let scratch_root = TempDir::new().unwrap();
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let tracker = Arc::new(InMemoryExecutionTracker::new());
    let config = FlowVaultConfig {
        scratch_dir: scratch_root.path().to_path_buf(),
        retention_window: options.retention_window,
        upload_deadline_secs: options.deadline_secs,
        validator_order: options.validator_order,
        ..FlowVaultConfig::default()
    };
    let manager = UploadManager::new(
        config,
        metadata.clone(),
        artifacts.clone(),
        tracker.clone(),
        &options.registry,
    )
    .unwrap();
    TestVault {
        manager,
        metadata,
        artifacts,
        tracker,
        scratch_root,
    }
}

/// Build a pipeline over externally-supplied stores (for fault injection).
pub fn vault_over(
    metadata: Arc<dyn MetadataStore>,
    artifacts: Arc<dyn ArtifactStore>,
) -> (UploadManager, TempDir) {
    let scratch_root = TempDir::new().unwrap();
    let config = FlowVaultConfig {
        scratch_dir: scratch_root.path().to_path_buf(),
        ..FlowVaultConfig::default()
    };
    let manager = UploadManager::new(
        config,
        metadata,
        artifacts,
        Arc::new(InMemoryExecutionTracker::new()),
        &ValidatorRegistry::new(),
    )
    .unwrap();
    (manager, scratch_root)
}

pub fn request(project: &Project, bytes: Vec<u8>) -> UploadRequest {
    UploadRequest {
        project_id: project.id,
        archive_name: format!("{}.zip", project.name),
        archive_bytes: bytes,
        declared_format: "zip".into(),
        uploader: "alice".into(),
        props: BTreeMap::new(),
    }
}

/// Artifact store whose `put` can be switched to fail, for compensation
/// tests.
pub struct FailingArtifactStore {
    inner: InMemoryArtifactStore,
    fail_puts: AtomicBool,
}

impl FailingArtifactStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryArtifactStore::new(),
            fail_puts: AtomicBool::new(false),
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn blob_count(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl ArtifactStore for FailingArtifactStore {
    async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> Result<(), ArtifactStoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ArtifactStoreError::Backend("injected put failure".into()));
        }
        self.inner.put(key, bytes).await
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, ArtifactStoreError> {
        self.inner.get(key).await
    }

    async fn delete(&self, keys: &[ArtifactKey]) -> Result<(), ArtifactStoreError> {
        self.inner.delete(keys).await
    }
}

/// Metadata store delegating to an in-memory store, with a switch that makes
/// `insert_flow_versions` fail (simulates a commit-phase fault after the
/// blob upload succeeded).
pub struct FlakyMetadataStore {
    inner: Arc<InMemoryMetadataStore>,
    fail_flow_inserts: AtomicBool,
}

impl FlakyMetadataStore {
    pub fn new(inner: Arc<InMemoryMetadataStore>) -> Self {
        Self {
            inner,
            fail_flow_inserts: AtomicBool::new(false),
        }
    }

    pub fn fail_flow_inserts(&self, fail: bool) {
        self.fail_flow_inserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for FlakyMetadataStore {
    async fn create_project(&self, name: &str, actor: &str) -> Result<Project, MetadataError> {
        self.inner.create_project(name, actor).await
    }

    async fn fetch_project(&self, project_id: i64) -> Result<Project, MetadataError> {
        self.inner.fetch_project(project_id).await
    }

    async fn fetch_project_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Project>, MetadataError> {
        self.inner.fetch_project_by_name(name).await
    }

    async fn get_latest_project_version(&self, project_id: i64) -> Result<i64, MetadataError> {
        self.inner.get_latest_project_version(project_id).await
    }

    async fn get_latest_allocated_version(
        &self,
        project_id: i64,
    ) -> Result<Option<ProjectVersionRow>, MetadataError> {
        self.inner.get_latest_allocated_version(project_id).await
    }

    async fn insert_pending_version(
        &self,
        row: &ProjectVersionRow,
    ) -> Result<(), MetadataError> {
        self.inner.insert_pending_version(row).await
    }

    async fn resolve_version(
        &self,
        project_id: i64,
        version: i64,
        artifact_key: &str,
        content_hash: &str,
        uploader: &str,
        archive_name: &str,
    ) -> Result<(), MetadataError> {
        self.inner
            .resolve_version(
                project_id,
                version,
                artifact_key,
                content_hash,
                uploader,
                archive_name,
            )
            .await
    }

    async fn insert_flow_versions(&self, flows: &[FlowRecord]) -> Result<(), MetadataError> {
        if self.fail_flow_inserts.load(Ordering::SeqCst) {
            return Err(MetadataError::Database("injected flow insert failure".into()));
        }
        self.inner.insert_flow_versions(flows).await
    }

    async fn get_latest_flow_version(
        &self,
        project_id: i64,
        flow_id: &str,
    ) -> Result<i64, MetadataError> {
        self.inner.get_latest_flow_version(project_id, flow_id).await
    }

    async fn fetch_flows_at(
        &self,
        project_id: i64,
        project_version: i64,
    ) -> Result<Vec<FlowRecord>, MetadataError> {
        self.inner.fetch_flows_at(project_id, project_version).await
    }

    async fn insert_flow_files(&self, files: &[FlowFileRow]) -> Result<(), MetadataError> {
        self.inner.insert_flow_files(files).await
    }

    async fn get_latest_flow_file_version(
        &self,
        project_id: i64,
        project_version: i64,
        file_name: &str,
    ) -> Result<i64, MetadataError> {
        self.inner
            .get_latest_flow_file_version(project_id, project_version, file_name)
            .await
    }

    async fn insert_project_properties(
        &self,
        project_id: i64,
        project_version: i64,
        records: &[PropertySetRecord],
    ) -> Result<(), MetadataError> {
        self.inner
            .insert_project_properties(project_id, project_version, records)
            .await
    }

    async fn fetch_project_properties(
        &self,
        project_id: i64,
        project_version: i64,
    ) -> Result<Vec<PropertySetRecord>, MetadataError> {
        self.inner
            .fetch_project_properties(project_id, project_version)
            .await
    }

    async fn post_audit_event(&self, event: &AuditEvent) -> Result<(), MetadataError> {
        self.inner.post_audit_event(event).await
    }

    async fn list_resolved_versions(&self, project_id: i64) -> Result<Vec<i64>, MetadataError> {
        self.inner.list_resolved_versions(project_id).await
    }

    async fn delete_versions(
        &self,
        project_id: i64,
        versions: &[i64],
    ) -> Result<(), MetadataError> {
        self.inner.delete_versions(project_id, versions).await
    }

    async fn list_audit_events(&self, project_id: i64) -> Result<Vec<AuditEvent>, MetadataError> {
        self.inner.list_audit_events(project_id).await
    }
}

/// Validator that rewrites `target` (relative path) with `replacement` and
/// reports the mutation, driving the re-pack path.
pub struct RewritingValidator {
    pub target: String,
    pub replacement: String,
}

#[async_trait]
impl Validator for RewritingValidator {
    fn name(&self) -> &str {
        "rewriter"
    }

    async fn validate(
        &self,
        ctx: &ValidatorContext<'_>,
    ) -> Result<ValidationReport, ValidatorFault> {
        std::fs::write(ctx.dir.join(&self.target), &self.replacement)?;
        let mut report = ValidationReport::pass();
        report.record_modified(self.target.clone());
        Ok(report)
    }
}

/// Validator that sleeps, for deadline tests.
pub struct SlowValidator {
    pub delay: std::time::Duration,
}

#[async_trait]
impl Validator for SlowValidator {
    fn name(&self) -> &str {
        "slow"
    }

    async fn validate(
        &self,
        _ctx: &ValidatorContext<'_>,
    ) -> Result<ValidationReport, ValidatorFault> {
        tokio::time::sleep(self.delay).await;
        Ok(ValidationReport::pass())
    }
}
