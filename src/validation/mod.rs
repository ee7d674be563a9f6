//! # Validator Chain
//!
//! Pluggable project validation. Validators are registered by name and run in
//! the configuration-defined order; each returns a [`ValidationReport`] that
//! may also record files it rewrote or removed in the scratch directory.
//!
//! Fault contract: a validator's *internal* fault (a bug in the plugin)
//! degrades to an ERROR-status report for that validator and the chain keeps
//! going; a *resource* fault (I/O, network) aborts the whole upload.

pub mod chain;
pub mod thin;

pub use chain::ValidatorChain;
pub use thin::ThinManifestValidator;

use crate::models::project::Project;
use crate::models::validation::ValidationReport;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Faults a validator can raise instead of producing a report.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorFault {
    /// A defect inside the validator itself. Downgraded to an ERROR report
    /// for that validator; the chain continues.
    #[error("validator internal fault: {0}")]
    Internal(String),

    /// A resource-level fault (filesystem, network). Propagates and aborts
    /// the upload.
    #[error("validator resource fault: {0}")]
    Resource(#[from] std::io::Error),
}

/// Everything a validator gets to look at: the owning project, the scratch
/// directory it may rewrite, the thin manifest location when the archive is
/// Thin, and free-form upload properties.
pub struct ValidatorContext<'a> {
    pub project: &'a Project,
    pub dir: &'a Path,
    pub manifest_path: Option<&'a Path>,
    pub props: &'a BTreeMap<String, String>,
}

/// The validator plugin contract.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Registry name; also the key of this validator's report.
    fn name(&self) -> &str;

    async fn validate(
        &self,
        ctx: &ValidatorContext<'_>,
    ) -> Result<ValidationReport, ValidatorFault>;
}

/// Named registry of validator implementations. The chain is assembled from
/// it using the configured order.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        self.validators
            .insert(validator.name().to_string(), validator);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Validator>> {
        self.validators.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.validators.keys().cloned().collect();
        names.sort();
        names
    }
}
