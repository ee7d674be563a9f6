//! Keyed per-project mutual exclusion.
//!
//! The commit phase serializes per project id; distinct projects commit
//! fully in parallel. An explicit keyed map (instead of locking on some
//! business object's identity) keeps the lock scope visible at the call
//! site.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct ProjectLockMap {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl ProjectLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for a project, created on first use. Clones share the same
    /// underlying mutex for equal ids.
    pub fn lock_for(&self, project_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(project_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
