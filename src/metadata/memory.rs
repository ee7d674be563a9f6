//! In-memory metadata store for tests and embedded use. Semantics mirror the
//! Postgres implementation, including the single-writer transactional
//! behavior of `resolve_version` (one mutex section covers the whole
//! operation).

use super::{MetadataError, MetadataStore};
use crate::models::flow::{FlowFileRow, FlowRecord, PropertySetRecord};
use crate::models::project::{AuditEvent, AuditEventKind, Project, ProjectVersionRow};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct Inner {
    next_project_id: i64,
    projects: HashMap<i64, Project>,
    /// (project_id, version) -> row
    versions: BTreeMap<(i64, i64), ProjectVersionRow>,
    flows: Vec<FlowRecord>,
    flow_files: Vec<FlowFileRow>,
    /// (project_id, project_version) -> property sets
    properties: HashMap<(i64, i64), Vec<PropertySetRecord>>,
    events: Vec<AuditEvent>,
}

#[derive(Default)]
pub struct InMemoryMetadataStore {
    inner: Mutex<Inner>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn project_mut(
        inner: &mut Inner,
        project_id: i64,
    ) -> Result<&mut Project, MetadataError> {
        inner
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| MetadataError::NotFound(format!("project {project_id}")))
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create_project(&self, name: &str, actor: &str) -> Result<Project, MetadataError> {
        let mut inner = self.inner.lock();
        if inner.projects.values().any(|p| p.name == name) {
            return Err(MetadataError::Conflict(format!(
                "project {name:?} already exists"
            )));
        }
        inner.next_project_id += 1;
        let now = Utc::now();
        let project = Project {
            id: inner.next_project_id,
            name: name.to_string(),
            version: 0,
            last_modified_by: Some(actor.to_string()),
            created_at: now,
            modified_at: now,
        };
        inner.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn fetch_project(&self, project_id: i64) -> Result<Project, MetadataError> {
        self.inner
            .lock()
            .projects
            .get(&project_id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(format!("project {project_id}")))
    }

    async fn fetch_project_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Project>, MetadataError> {
        Ok(self
            .inner
            .lock()
            .projects
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn get_latest_project_version(&self, project_id: i64) -> Result<i64, MetadataError> {
        let inner = self.inner.lock();
        inner
            .projects
            .get(&project_id)
            .map(|p| p.version)
            .ok_or_else(|| MetadataError::NotFound(format!("project {project_id}")))
    }

    async fn get_latest_allocated_version(
        &self,
        project_id: i64,
    ) -> Result<Option<ProjectVersionRow>, MetadataError> {
        let inner = self.inner.lock();
        Ok(inner
            .versions
            .range((project_id, i64::MIN)..=(project_id, i64::MAX))
            .next_back()
            .map(|(_, row)| row.clone()))
    }

    async fn insert_pending_version(
        &self,
        row: &ProjectVersionRow,
    ) -> Result<(), MetadataError> {
        let mut inner = self.inner.lock();
        let key = (row.project_id, row.version);
        if inner.versions.contains_key(&key) {
            return Err(MetadataError::Conflict(format!(
                "version {} of project {} already allocated",
                row.version, row.project_id
            )));
        }
        inner.versions.insert(key, row.clone());
        Ok(())
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
        let mut inner = self.inner.lock();
        let row = inner
            .versions
            .get_mut(&(project_id, version))
            .ok_or_else(|| {
                MetadataError::NotFound(format!("version {version} of project {project_id}"))
            })?;
        row.artifact_key = Some(artifact_key.to_string());
        row.content_hash = Some(content_hash.to_string());

        let project = Self::project_mut(&mut inner, project_id)?;
        project.version = version;
        project.last_modified_by = Some(uploader.to_string());
        project.modified_at = Utc::now();

        inner.events.push(AuditEvent::now(
            project_id,
            AuditEventKind::Uploaded,
            uploader,
            format!("Uploaded project archive {archive_name}"),
        ));
        Ok(())
    }

    async fn insert_flow_versions(&self, flows: &[FlowRecord]) -> Result<(), MetadataError> {
        let mut inner = self.inner.lock();
        for flow in flows {
            let duplicate = inner.flows.iter().any(|f| {
                f.project_id == flow.project_id
                    && f.flow_id == flow.flow_id
                    && f.flow_version == flow.flow_version
            });
            if duplicate {
                return Err(MetadataError::Conflict(format!(
                    "flow {} v{} of project {} already exists",
                    flow.flow_id, flow.flow_version, flow.project_id
                )));
            }
            inner.flows.push(flow.clone());
        }
        Ok(())
    }

    async fn get_latest_flow_version(
        &self,
        project_id: i64,
        flow_id: &str,
    ) -> Result<i64, MetadataError> {
        let inner = self.inner.lock();
        Ok(inner
            .flows
            .iter()
            .filter(|f| f.project_id == project_id && f.flow_id == flow_id)
            .map(|f| f.flow_version)
            .max()
            .unwrap_or(0))
    }

    async fn fetch_flows_at(
        &self,
        project_id: i64,
        project_version: i64,
    ) -> Result<Vec<FlowRecord>, MetadataError> {
        let inner = self.inner.lock();
        Ok(inner
            .flows
            .iter()
            .filter(|f| f.project_id == project_id && f.project_version == project_version)
            .cloned()
            .collect())
    }

    async fn insert_flow_files(&self, files: &[FlowFileRow]) -> Result<(), MetadataError> {
        let mut inner = self.inner.lock();
        inner.flow_files.extend_from_slice(files);
        Ok(())
    }

    async fn get_latest_flow_file_version(
        &self,
        project_id: i64,
        project_version: i64,
        file_name: &str,
    ) -> Result<i64, MetadataError> {
        let inner = self.inner.lock();
        Ok(inner
            .flow_files
            .iter()
            .filter(|f| {
                f.project_id == project_id
                    && f.project_version == project_version
                    && f.file_name == file_name
            })
            .map(|f| f.file_version)
            .max()
            .unwrap_or(0))
    }

    async fn insert_project_properties(
        &self,
        project_id: i64,
        project_version: i64,
        records: &[PropertySetRecord],
    ) -> Result<(), MetadataError> {
        let mut inner = self.inner.lock();
        inner
            .properties
            .entry((project_id, project_version))
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    async fn fetch_project_properties(
        &self,
        project_id: i64,
        project_version: i64,
    ) -> Result<Vec<PropertySetRecord>, MetadataError> {
        let inner = self.inner.lock();
        Ok(inner
            .properties
            .get(&(project_id, project_version))
            .cloned()
            .unwrap_or_default())
    }

    async fn post_audit_event(&self, event: &AuditEvent) -> Result<(), MetadataError> {
        self.inner.lock().events.push(event.clone());
        Ok(())
    }

    async fn list_resolved_versions(&self, project_id: i64) -> Result<Vec<i64>, MetadataError> {
        let inner = self.inner.lock();
        Ok(inner
            .versions
            .range((project_id, i64::MIN)..=(project_id, i64::MAX))
            .filter(|(_, row)| !row.is_pending())
            .map(|((_, version), _)| *version)
            .collect())
    }

    async fn delete_versions(
        &self,
        project_id: i64,
        versions: &[i64],
    ) -> Result<(), MetadataError> {
        let mut inner = self.inner.lock();

        // A flow's newest record survives even if its project version is
        // deleted: the per-flow counter must never regress on a later
        // re-upload.
        let mut latest_per_flow: HashMap<String, i64> = HashMap::new();
        for flow in inner.flows.iter().filter(|f| f.project_id == project_id) {
            let entry = latest_per_flow.entry(flow.flow_id.clone()).or_insert(0);
            *entry = (*entry).max(flow.flow_version);
        }

        for version in versions {
            inner.versions.remove(&(project_id, *version));
            inner.properties.remove(&(project_id, *version));
        }
        inner.flows.retain(|f| {
            f.project_id != project_id
                || !versions.contains(&f.project_version)
                || latest_per_flow.get(&f.flow_id) == Some(&f.flow_version)
        });
        inner.flow_files.retain(|f| {
            f.project_id != project_id || !versions.contains(&f.project_version)
        });
        Ok(())
    }

    async fn list_audit_events(&self, project_id: i64) -> Result<Vec<AuditEvent>, MetadataError> {
        let inner = self.inner.lock();
        Ok(inner
            .events
            .iter()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect())
    }
}
