//! Postgres-backed metadata store.
//!
//! Uses the runtime sqlx query API throughout so the crate builds without a
//! live database. Multi-statement operations run inside a single sqlx
//! transaction; the version pointer is only touched by `resolve_version`.

use super::{MetadataError, MetadataStore};
use crate::models::flow::{FlowFileRow, FlowRecord, PropertySetRecord};
use crate::models::project::{AuditEvent, AuditEventKind, Project, ProjectVersionRow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS fv_projects (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        version BIGINT NOT NULL DEFAULT 0,
        last_modified_by TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        modified_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fv_project_versions (
        project_id BIGINT NOT NULL,
        version BIGINT NOT NULL,
        upload_time TIMESTAMPTZ NOT NULL,
        uploader TEXT NOT NULL,
        archive_name TEXT NOT NULL,
        artifact_key TEXT,
        content_hash TEXT,
        PRIMARY KEY (project_id, version)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fv_project_flows (
        project_id BIGINT NOT NULL,
        flow_id TEXT NOT NULL,
        flow_version BIGINT NOT NULL,
        project_version BIGINT NOT NULL,
        graph JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (project_id, flow_id, flow_version)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fv_flow_files (
        project_id BIGINT NOT NULL,
        project_version BIGINT NOT NULL,
        file_name TEXT NOT NULL,
        file_version BIGINT NOT NULL,
        content BYTEA NOT NULL,
        PRIMARY KEY (project_id, project_version, file_name, file_version)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fv_project_properties (
        project_id BIGINT NOT NULL,
        project_version BIGINT NOT NULL,
        source TEXT NOT NULL,
        properties JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fv_project_events (
        project_id BIGINT NOT NULL,
        kind TEXT NOT NULL,
        actor TEXT NOT NULL,
        time TIMESTAMPTZ NOT NULL,
        message TEXT NOT NULL
    )
    "#,
];

pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bootstrap the schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, MetadataError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), MetadataError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("metadata schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn conflict_or(err: sqlx::Error, what: String) -> MetadataError {
    if err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        MetadataError::Conflict(what)
    } else {
        err.into()
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn create_project(&self, name: &str, actor: &str) -> Result<Project, MetadataError> {
        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO fv_projects (name, last_modified_by)
            VALUES ($1, $2)
            RETURNING id, name, version, last_modified_by, created_at, modified_at
            "#,
        )
        .bind(name)
        .bind(actor)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, format!("project {name:?} already exists")))
    }

    async fn fetch_project(&self, project_id: i64) -> Result<Project, MetadataError> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, version, last_modified_by, created_at, modified_at
            FROM fv_projects WHERE id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MetadataError::NotFound(format!("project {project_id}")))
    }

    async fn fetch_project_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Project>, MetadataError> {
        Ok(sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, version, last_modified_by, created_at, modified_at
            FROM fv_projects WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_latest_project_version(&self, project_id: i64) -> Result<i64, MetadataError> {
        sqlx::query_scalar::<_, i64>("SELECT version FROM fv_projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| MetadataError::NotFound(format!("project {project_id}")))
    }

    async fn get_latest_allocated_version(
        &self,
        project_id: i64,
    ) -> Result<Option<ProjectVersionRow>, MetadataError> {
        Ok(sqlx::query_as::<_, ProjectVersionRow>(
            r#"
            SELECT project_id, version, upload_time, uploader, archive_name,
                   artifact_key, content_hash
            FROM fv_project_versions
            WHERE project_id = $1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_pending_version(
        &self,
        row: &ProjectVersionRow,
    ) -> Result<(), MetadataError> {
        sqlx::query(
            r#"
            INSERT INTO fv_project_versions
                (project_id, version, upload_time, uploader, archive_name, artifact_key, content_hash)
            VALUES ($1, $2, $3, $4, $5, NULL, NULL)
            "#,
        )
        .bind(row.project_id)
        .bind(row.version)
        .bind(row.upload_time)
        .bind(&row.uploader)
        .bind(&row.archive_name)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_or(
                e,
                format!(
                    "version {} of project {} already allocated",
                    row.version, row.project_id
                ),
            )
        })?;
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
        let mut tx = self.pool.begin().await?;

        let stamped = sqlx::query(
            r#"
            UPDATE fv_project_versions
            SET artifact_key = $3, content_hash = $4
            WHERE project_id = $1 AND version = $2
            "#,
        )
        .bind(project_id)
        .bind(version)
        .bind(artifact_key)
        .bind(content_hash)
        .execute(&mut *tx)
        .await?;
        if stamped.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!(
                "version {version} of project {project_id}"
            )));
        }

        sqlx::query(
            r#"
            UPDATE fv_projects
            SET version = $2, last_modified_by = $3, modified_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .bind(version)
        .bind(uploader)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO fv_project_events (project_id, kind, actor, time, message)
            VALUES ($1, $2, $3, NOW(), $4)
            "#,
        )
        .bind(project_id)
        .bind(AuditEventKind::Uploaded.to_string())
        .bind(uploader)
        .bind(format!("Uploaded project archive {archive_name}"))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_flow_versions(&self, flows: &[FlowRecord]) -> Result<(), MetadataError> {
        let mut tx = self.pool.begin().await?;
        for flow in flows {
            sqlx::query(
                r#"
                INSERT INTO fv_project_flows
                    (project_id, flow_id, flow_version, project_version, graph, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(flow.project_id)
            .bind(&flow.flow_id)
            .bind(flow.flow_version)
            .bind(flow.project_version)
            .bind(&flow.graph)
            .bind(flow.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                conflict_or(
                    e,
                    format!(
                        "flow {} v{} of project {} already exists",
                        flow.flow_id, flow.flow_version, flow.project_id
                    ),
                )
            })?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_latest_flow_version(
        &self,
        project_id: i64,
        flow_id: &str,
    ) -> Result<i64, MetadataError> {
        Ok(sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT MAX(flow_version) FROM fv_project_flows
            WHERE project_id = $1 AND flow_id = $2
            "#,
        )
        .bind(project_id)
        .bind(flow_id)
        .fetch_one(&self.pool)
        .await?
        .unwrap_or(0))
    }

    async fn fetch_flows_at(
        &self,
        project_id: i64,
        project_version: i64,
    ) -> Result<Vec<FlowRecord>, MetadataError> {
        Ok(sqlx::query_as::<_, FlowRecord>(
            r#"
            SELECT project_id, flow_id, flow_version, project_version, graph, created_at
            FROM fv_project_flows
            WHERE project_id = $1 AND project_version = $2
            ORDER BY flow_id
            "#,
        )
        .bind(project_id)
        .bind(project_version)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_flow_files(&self, files: &[FlowFileRow]) -> Result<(), MetadataError> {
        let mut tx = self.pool.begin().await?;
        for file in files {
            sqlx::query(
                r#"
                INSERT INTO fv_flow_files
                    (project_id, project_version, file_name, file_version, content)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(file.project_id)
            .bind(file.project_version)
            .bind(&file.file_name)
            .bind(file.file_version)
            .bind(&file.content)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_latest_flow_file_version(
        &self,
        project_id: i64,
        project_version: i64,
        file_name: &str,
    ) -> Result<i64, MetadataError> {
        Ok(sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT MAX(file_version) FROM fv_flow_files
            WHERE project_id = $1 AND project_version = $2 AND file_name = $3
            "#,
        )
        .bind(project_id)
        .bind(project_version)
        .bind(file_name)
        .fetch_one(&self.pool)
        .await?
        .unwrap_or(0))
    }

    async fn insert_project_properties(
        &self,
        project_id: i64,
        project_version: i64,
        records: &[PropertySetRecord],
    ) -> Result<(), MetadataError> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            let properties = serde_json::to_value(&record.properties)
                .map_err(|e| MetadataError::Database(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO fv_project_properties (project_id, project_version, source, properties)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(project_id)
            .bind(project_version)
            .bind(&record.source)
            .bind(properties)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_project_properties(
        &self,
        project_id: i64,
        project_version: i64,
    ) -> Result<Vec<PropertySetRecord>, MetadataError> {
        let rows = sqlx::query_as::<_, (String, serde_json::Value)>(
            r#"
            SELECT source, properties FROM fv_project_properties
            WHERE project_id = $1 AND project_version = $2
            ORDER BY source
            "#,
        )
        .bind(project_id)
        .bind(project_version)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(source, properties)| {
                let properties = serde_json::from_value(properties)
                    .map_err(|e| MetadataError::Database(e.to_string()))?;
                Ok(PropertySetRecord { source, properties })
            })
            .collect()
    }

    async fn post_audit_event(&self, event: &AuditEvent) -> Result<(), MetadataError> {
        sqlx::query(
            r#"
            INSERT INTO fv_project_events (project_id, kind, actor, time, message)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.project_id)
        .bind(event.kind.to_string())
        .bind(&event.actor)
        .bind(event.time)
        .bind(&event.message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_resolved_versions(&self, project_id: i64) -> Result<Vec<i64>, MetadataError> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"
            SELECT version FROM fv_project_versions
            WHERE project_id = $1 AND artifact_key IS NOT NULL
            ORDER BY version
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_versions(
        &self,
        project_id: i64,
        versions: &[i64],
    ) -> Result<(), MetadataError> {
        let versions: Vec<i64> = versions.to_vec();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM fv_project_versions WHERE project_id = $1 AND version = ANY($2)",
        )
        .bind(project_id)
        .bind(&versions)
        .execute(&mut *tx)
        .await?;

        // A flow's newest record survives even if its project version is
        // purged: the per-flow counter must never regress on a later
        // re-upload.
        sqlx::query(
            r#"
            DELETE FROM fv_project_flows
            WHERE project_id = $1 AND project_version = ANY($2)
              AND (flow_id, flow_version) NOT IN (
                  SELECT flow_id, MAX(flow_version)
                  FROM fv_project_flows
                  WHERE project_id = $1
                  GROUP BY flow_id
              )
            "#,
        )
        .bind(project_id)
        .bind(&versions)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM fv_flow_files WHERE project_id = $1 AND project_version = ANY($2)",
        )
        .bind(project_id)
        .bind(&versions)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM fv_project_properties WHERE project_id = $1 AND project_version = ANY($2)",
        )
        .bind(project_id)
        .bind(&versions)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_audit_events(&self, project_id: i64) -> Result<Vec<AuditEvent>, MetadataError> {
        let rows = sqlx::query_as::<_, (i64, String, String, DateTime<Utc>, String)>(
            r#"
            SELECT project_id, kind, actor, time, message
            FROM fv_project_events
            WHERE project_id = $1
            ORDER BY time
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(project_id, kind, actor, time, message)| {
                let kind = match kind.as_str() {
                    "UPLOADED" => AuditEventKind::Uploaded,
                    "PURGED" => AuditEventKind::Purged,
                    other => {
                        return Err(MetadataError::Database(format!(
                            "unknown audit event kind {other:?}"
                        )))
                    }
                };
                Ok(AuditEvent {
                    project_id,
                    kind,
                    actor,
                    time,
                    message,
                })
            })
            .collect()
    }
}
