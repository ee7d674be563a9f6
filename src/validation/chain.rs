//! Ordered execution of the configured validator sequence.

use super::{Validator, ValidatorContext, ValidatorFault, ValidatorRegistry};
use crate::error::{Result, UploadError};
use crate::models::validation::{ReportMap, ValidationReport};
use std::sync::Arc;
use tracing::{debug, warn};

/// An ordered chain of validators resolved from the registry.
pub struct ValidatorChain {
    validators: Vec<Arc<dyn Validator>>,
}

impl std::fmt::Debug for ValidatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorChain")
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl ValidatorChain {
    /// Resolve `order` against the registry. An unknown name is a
    /// configuration error: the pipeline refuses to assemble rather than
    /// silently skipping a validator.
    pub fn from_registry(registry: &ValidatorRegistry, order: &[String]) -> Result<Self> {
        let mut validators = Vec::with_capacity(order.len());
        for name in order {
            let validator = registry
                .get(name)
                .ok_or_else(|| UploadError::Configuration(format!("unknown validator {name:?}")))?;
            validators.push(validator);
        }
        Ok(Self { validators })
    }

    /// Wrap an explicit validator list; used when the caller assembles the
    /// chain directly (e.g. to front it with the thin-manifest validator).
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> Self {
        Self { validators }
    }

    /// Unwrap into the resolved validator list, e.g. to prepend
    /// format-specific validators per upload.
    pub fn into_validators(self) -> Vec<Arc<dyn Validator>> {
        self.validators
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every validator in order, collecting reports by name.
    ///
    /// Internal faults become ERROR reports for the faulting validator;
    /// resource faults abort with [`UploadError::Io`].
    pub async fn run(&self, ctx: &ValidatorContext<'_>) -> Result<ReportMap> {
        let mut reports = ReportMap::new();
        for validator in &self.validators {
            let name = validator.name().to_string();
            match validator.validate(ctx).await {
                Ok(report) => {
                    debug!(
                        validator = %name,
                        status = ?report.status,
                        modified = report.modified_files.len(),
                        removed = report.removed_files.len(),
                        "validator completed"
                    );
                    reports.insert(name, report);
                }
                Err(ValidatorFault::Internal(message)) => {
                    warn!(validator = %name, error = %message, "validator internal fault, recording as ERROR");
                    reports.insert(
                        name,
                        ValidationReport::error(format!("validator failed internally: {message}")),
                    );
                }
                Err(ValidatorFault::Resource(io)) => {
                    return Err(UploadError::Io(io));
                }
            }
        }
        Ok(reports)
    }
}
