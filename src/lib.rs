#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # FlowVault
//!
//! Versioned storage and validation core for workflow project archives.
//!
//! ## Overview
//!
//! FlowVault accepts a packaged workflow definition, a "project" archive
//! containing a set of job-dependency graphs called flows, validates it
//! through a pluggable validator chain, and durably records a new version of
//! the project and of every flow it contains. Storage for versions no longer
//! needed by running work is reclaimed by a retention reaper.
//!
//! This crate is the core library; the HTTP/REST presentation layer, the
//! blob-store backend and the execution engine are external collaborators
//! behind traits.
//!
//! ## Pipeline
//!
//! Extract → detect format (Fat/Thin) → validate (re-serializing the archive
//! when a validator rewrites files) → parse flow graphs → gate on aggregate
//! validation status → allocate versions and persist atomically under
//! per-project exclusivity → reap old versions.
//!
//! ## Module Organization
//!
//! - [`models`] - Domain rows: projects, versions, flows, reports, events
//! - [`archive`] - Extraction, format detection, re-packing
//! - [`validation`] - Validator plugin contract and ordered chain
//! - [`loader`] - Flow-graph loading over the two directory layouts
//! - [`storage`] - Artifact (blob) store seam and implementations
//! - [`metadata`] - Transactional metadata store seam and implementations
//! - [`tracker`] - Execution-tracker collaborator
//! - [`upload`] - The pipeline facade, commit path, locking and retention
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowvault::config::FlowVaultConfig;
//! use flowvault::metadata::InMemoryMetadataStore;
//! use flowvault::storage::InMemoryArtifactStore;
//! use flowvault::tracker::InMemoryExecutionTracker;
//! use flowvault::upload::{UploadManager, UploadRequest};
//! use flowvault::validation::ValidatorRegistry;
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = UploadManager::new(
//!     FlowVaultConfig::default(),
//!     Arc::new(InMemoryMetadataStore::new()),
//!     Arc::new(InMemoryArtifactStore::new()),
//!     Arc::new(InMemoryExecutionTracker::new()),
//!     &ValidatorRegistry::new(),
//! )?;
//!
//! let project = manager.create_project("orders-etl", "alice").await?;
//! let outcome = manager
//!     .upload(UploadRequest {
//!         project_id: project.id,
//!         archive_name: "orders-etl.zip".into(),
//!         archive_bytes: std::fs::read("orders-etl.zip")?,
//!         declared_format: "zip".into(),
//!         uploader: "alice".into(),
//!         props: BTreeMap::new(),
//!     })
//!     .await?;
//! println!("uploaded as version {:?}", outcome.version());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod storage;
pub mod tracker;
pub mod upload;
pub mod validation;

pub use config::FlowVaultConfig;
pub use error::{Result, UploadError};
pub use models::{
    AuditEvent, AuditEventKind, ExecutionReference, FlowRecord, Project, ProjectVersionRow,
    ReportMap, ValidationReport, ValidationStatus,
};
pub use upload::{UploadManager, UploadOutcome, UploadRequest};
