//! Execution-tracker collaborator: the read-only source of in-flight
//! executions. The reaper uses it to pin versions that running work still
//! references.

use crate::models::execution::ExecutionReference;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("execution tracker unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ExecutionTracker: Send + Sync {
    /// All executions that have not reached a terminal state, across every
    /// project.
    async fn fetch_unfinished_executions(
        &self,
    ) -> Result<Vec<ExecutionReference>, TrackerError>;
}

/// In-memory tracker for tests and embedded use.
#[derive(Default)]
pub struct InMemoryExecutionTracker {
    executions: DashMap<i64, ExecutionReference>,
}

impl InMemoryExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, execution: ExecutionReference) {
        self.executions.insert(execution.execution_id, execution);
    }

    pub fn finish(&self, execution_id: i64) {
        self.executions.remove(&execution_id);
    }
}

#[async_trait]
impl ExecutionTracker for InMemoryExecutionTracker {
    async fn fetch_unfinished_executions(
        &self,
    ) -> Result<Vec<ExecutionReference>, TrackerError> {
        Ok(self.executions.iter().map(|e| *e.value()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_start_and_finish() {
        let tracker = InMemoryExecutionTracker::new();
        tracker.start(ExecutionReference {
            execution_id: 10,
            project_id: 1,
            version: 2,
        });
        assert_eq!(tracker.fetch_unfinished_executions().await.unwrap().len(), 1);

        tracker.finish(10);
        assert!(tracker.fetch_unfinished_executions().await.unwrap().is_empty());
    }
}
