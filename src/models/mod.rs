//! Domain data model: projects, versions, flows, validation reports,
//! execution references and audit events.

pub mod execution;
pub mod flow;
pub mod project;
pub mod validation;

pub use execution::ExecutionReference;
pub use flow::{FlowFileRow, FlowRecord, PropertySetRecord};
pub use project::{AuditEvent, AuditEventKind, Project, ProjectVersionRow};
pub use validation::{
    aggregate_status, is_acceptable, requires_repack, ReportMap, ValidationReport,
    ValidationStatus, FLOW_STRUCTURE_REPORT_KEY,
};
