//! Read-only references to in-flight executions, sourced from the external
//! execution tracker. The reaper treats the referenced versions as protected.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionReference {
    pub execution_id: i64,
    pub project_id: i64,
    pub version: i64,
}
