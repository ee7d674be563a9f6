//! Flow version records and layout-specific auxiliary rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// One persisted version of a flow within a project.
///
/// Immutable once written: a re-upload inserts a new record with a higher
/// `flow_version`, never mutates an existing one. `project_version` is the
/// project version the record was introduced under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FlowRecord {
    pub project_id: i64,
    pub flow_id: String,
    /// Per-flow counter, strictly increasing from 1.
    pub flow_version: i64,
    pub project_version: i64,
    /// Serialized job-dependency graph.
    pub graph: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Hierarchical-layout auxiliary record: one row per flow-definition file,
/// with its own per-file version counter scoped to (project, project version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FlowFileRow {
    pub project_id: i64,
    pub project_version: i64,
    pub file_name: String,
    pub file_version: i64,
    pub content: Vec<u8>,
}

/// Flat-layout auxiliary record: a directory-scoped property set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySetRecord {
    /// Path of the source `.properties` file relative to the project root.
    pub source: String,
    pub properties: BTreeMap<String, String>,
}
