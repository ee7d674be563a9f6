//! Validation reports and the aggregate acceptance gate.
//!
//! Statuses form a total order (PASS < WARN < ERROR). The gate folds every
//! report in the map, including the structural flow-parsing report stored
//! under [`FLOW_STRUCTURE_REPORT_KEY`], and accepts the upload iff the
//! maximum stays below ERROR.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved report key holding the structural flow-parsing result.
pub const FLOW_STRUCTURE_REPORT_KEY: &str = "flow-structure";

/// Severity of a single validation report. Ordering is load-bearing:
/// aggregation takes the maximum across all reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    #[default]
    Pass,
    Warn,
    Error,
}

/// One validator's outcome: severity, messages and the record of files it
/// rewrote or deleted in the scratch directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub info_messages: Vec<String>,
    pub warn_messages: Vec<String>,
    pub error_messages: Vec<String>,
    /// Paths (relative to the scratch root) the validator modified in place.
    pub modified_files: Vec<String>,
    /// Paths the validator removed.
    pub removed_files: Vec<String>,
}

impl ValidationReport {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn info(message: impl Into<String>) -> Self {
        let mut report = Self::default();
        report.info_messages.push(message.into());
        report
    }

    pub fn warn(message: impl Into<String>) -> Self {
        let mut report = Self {
            status: ValidationStatus::Warn,
            ..Self::default()
        };
        report.warn_messages.push(message.into());
        report
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut report = Self {
            status: ValidationStatus::Error,
            ..Self::default()
        };
        report.error_messages.push(message.into());
        report
    }

    /// Record an error message and raise the severity to ERROR.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.error_messages.push(message.into());
        self.status = self.status.max(ValidationStatus::Error);
    }

    /// Record a warning message and raise the severity to at least WARN.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warn_messages.push(message.into());
        self.status = self.status.max(ValidationStatus::Warn);
    }

    pub fn record_modified(&mut self, path: impl Into<String>) {
        self.modified_files.push(path.into());
    }

    pub fn record_removed(&mut self, path: impl Into<String>) {
        self.removed_files.push(path.into());
    }

    /// Whether this report mutated the scratch directory.
    pub fn mutated_directory(&self) -> bool {
        !self.modified_files.is_empty() || !self.removed_files.is_empty()
    }
}

/// Report map keyed by validator name. BTreeMap keeps output ordering stable
/// for callers rendering the map.
pub type ReportMap = BTreeMap<String, ValidationReport>;

/// Fold all statuses to the most severe one. An empty map aggregates to PASS.
pub fn aggregate_status(reports: &ReportMap) -> ValidationStatus {
    reports
        .values()
        .map(|r| r.status)
        .max()
        .unwrap_or(ValidationStatus::Pass)
}

/// The acceptance gate: true iff no report reached ERROR.
pub fn is_acceptable(reports: &ReportMap) -> bool {
    aggregate_status(reports) < ValidationStatus::Error
}

/// True if any validator rewrote or removed files, requiring the canonical
/// archive to be regenerated from the scratch directory before persisting.
pub fn requires_repack(reports: &ReportMap) -> bool {
    reports.values().any(ValidationReport::mutated_directory)
}
