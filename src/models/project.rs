//! Project rows and the per-version bookkeeping records.
//!
//! A project is a named, versioned collection of flows. The version counter
//! is owned by the metadata store and only ever advances inside the
//! per-project critical section.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A workflow project: the unit of upload and versioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    /// Latest fully-committed version; 0 until the first successful upload.
    pub version: i64,
    pub last_modified_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// One allocated project version.
///
/// A row with `artifact_key: None` is *pending*: the version number has been
/// claimed but the archive upload has not resolved. The committer refuses to
/// allocate past a pending row, which is how a crashed commit is detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProjectVersionRow {
    pub project_id: i64,
    pub version: i64,
    pub upload_time: DateTime<Utc>,
    pub uploader: String,
    pub archive_name: String,
    pub artifact_key: Option<String>,
    /// SHA-256 of the stored archive bytes, stamped when the version resolves.
    pub content_hash: Option<String>,
}

impl ProjectVersionRow {
    /// A freshly-allocated version with no artifact reference yet.
    pub fn pending(project_id: i64, version: i64, uploader: &str, archive_name: &str) -> Self {
        Self {
            project_id,
            version,
            upload_time: Utc::now(),
            uploader: uploader.to_string(),
            archive_name: archive_name.to_string(),
            artifact_key: None,
            content_hash: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.artifact_key.is_none()
    }
}

/// Kinds of project audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    Uploaded,
    Purged,
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditEventKind::Uploaded => write!(f, "UPLOADED"),
            AuditEventKind::Purged => write!(f, "PURGED"),
        }
    }
}

/// An append-only project history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub project_id: i64,
    pub kind: AuditEventKind,
    pub actor: String,
    pub time: DateTime<Utc>,
    pub message: String,
}

impl AuditEvent {
    pub fn now(project_id: i64, kind: AuditEventKind, actor: &str, message: String) -> Self {
        Self {
            project_id,
            kind,
            actor: actor.to_string(),
            time: Utc::now(),
            message,
        }
    }
}
