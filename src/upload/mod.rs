//! Upload orchestration: the pipeline facade, the commit path, per-project
//! locking and retention cleanup.

pub mod committer;
pub mod lock;
pub mod manager;
pub mod reaper;

pub use committer::{ArtifactPersister, CommitRequest};
pub use lock::ProjectLockMap;
pub use manager::{UploadManager, UploadOutcome, UploadRequest};
pub use reaper::RetentionReaper;
