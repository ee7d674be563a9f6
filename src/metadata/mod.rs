//! # Metadata Store
//!
//! The relational seam: projects, version rows, flow records, auxiliary
//! layout records and audit events live behind the [`MetadataStore`] trait.
//! The schema layer itself is a collaborator; this crate ships a Postgres
//! implementation and an in-memory implementation with identical semantics.
//!
//! Multi-statement operations ([`MetadataStore::resolve_version`],
//! [`MetadataStore::delete_versions`]) are internally transactional. The
//! version pointer is only ever advanced by `resolve_version`, in the same
//! transaction that stamps the pending version row, so readers that follow
//! the pointer can never observe a half-committed upload.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryMetadataStore;
#[cfg(feature = "postgres")]
pub use postgres::PgMetadataStore;

use crate::models::flow::{FlowFileRow, FlowRecord, PropertySetRecord};
use crate::models::project::{AuditEvent, Project, ProjectVersionRow};
use async_trait::async_trait;

/// Errors raised by metadata-store operations.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness violation, e.g. allocating a version number that already
    /// has a row. Surfacing this keeps "versions are never reused" enforced
    /// at the store even if a caller bypasses the per-project lock.
    #[error("conflict: {0}")]
    Conflict(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for MetadataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => MetadataError::NotFound(err.to_string()),
            other => MetadataError::Database(other.to_string()),
        }
    }
}

/// Transactional metadata collaborator contract.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn create_project(&self, name: &str, actor: &str) -> Result<Project, MetadataError>;

    async fn fetch_project(&self, project_id: i64) -> Result<Project, MetadataError>;

    async fn fetch_project_by_name(&self, name: &str)
        -> Result<Option<Project>, MetadataError>;

    /// The committed version pointer; 0 before the first successful upload.
    async fn get_latest_project_version(&self, project_id: i64) -> Result<i64, MetadataError>;

    /// The highest allocated version row, pending or resolved. Used by the
    /// committer to detect an unresolved in-progress version.
    async fn get_latest_allocated_version(
        &self,
        project_id: i64,
    ) -> Result<Option<ProjectVersionRow>, MetadataError>;

    /// Claim a version number with a placeholder row (no artifact
    /// reference). Fails with [`MetadataError::Conflict`] if the version
    /// already has a row.
    async fn insert_pending_version(&self, row: &ProjectVersionRow) -> Result<(), MetadataError>;

    /// Resolve a pending version in one transaction: stamp the artifact key
    /// and content hash onto the version row, advance the project's version
    /// pointer and last-modified-by, and record the UPLOADED audit event.
    async fn resolve_version(
        &self,
        project_id: i64,
        version: i64,
        artifact_key: &str,
        content_hash: &str,
        uploader: &str,
        archive_name: &str,
    ) -> Result<(), MetadataError>;

    async fn insert_flow_versions(&self, flows: &[FlowRecord]) -> Result<(), MetadataError>;

    /// Latest persisted version of a flow; 0 if the flow id has never been
    /// seen in this project.
    async fn get_latest_flow_version(
        &self,
        project_id: i64,
        flow_id: &str,
    ) -> Result<i64, MetadataError>;

    /// All flow records introduced under the given project version.
    async fn fetch_flows_at(
        &self,
        project_id: i64,
        project_version: i64,
    ) -> Result<Vec<FlowRecord>, MetadataError>;

    async fn insert_flow_files(&self, files: &[FlowFileRow]) -> Result<(), MetadataError>;

    /// Latest per-file counter under (project, project version); 0 if unseen.
    async fn get_latest_flow_file_version(
        &self,
        project_id: i64,
        project_version: i64,
        file_name: &str,
    ) -> Result<i64, MetadataError>;

    async fn insert_project_properties(
        &self,
        project_id: i64,
        project_version: i64,
        records: &[PropertySetRecord],
    ) -> Result<(), MetadataError>;

    async fn fetch_project_properties(
        &self,
        project_id: i64,
        project_version: i64,
    ) -> Result<Vec<PropertySetRecord>, MetadataError>;

    async fn post_audit_event(&self, event: &AuditEvent) -> Result<(), MetadataError>;

    /// Versions with a resolved artifact reference, ascending.
    async fn list_resolved_versions(&self, project_id: i64) -> Result<Vec<i64>, MetadataError>;

    /// Remove the given versions and everything hanging off them (version
    /// rows, flow records, flow files, properties) in one transaction. Used
    /// by commit compensation and by the reaper. Missing versions are not an
    /// error.
    async fn delete_versions(
        &self,
        project_id: i64,
        versions: &[i64],
    ) -> Result<(), MetadataError>;

    async fn list_audit_events(&self, project_id: i64) -> Result<Vec<AuditEvent>, MetadataError>;
}
