//! Thin-archive manifest validation.
//!
//! Fronts the chain for Thin uploads: parses the startup-dependencies
//! manifest and reports structural problems (unreadable JSON, incomplete
//! coordinates, blank fields) as ERROR. A missing manifest file at this point
//! means format detection and validation disagree about the directory, and that
//! is an internal fault, not a policy outcome.

use super::{Validator, ValidatorContext, ValidatorFault};
use crate::archive::format::ThinManifest;
use crate::models::validation::ValidationReport;
use async_trait::async_trait;
use std::fs;
use tracing::debug;

pub const THIN_MANIFEST_VALIDATOR_NAME: &str = "thin-manifest";

/// Validates the Thin archive's dependency manifest.
#[derive(Debug, Default)]
pub struct ThinManifestValidator;

#[async_trait]
impl Validator for ThinManifestValidator {
    fn name(&self) -> &str {
        THIN_MANIFEST_VALIDATOR_NAME
    }

    async fn validate(
        &self,
        ctx: &ValidatorContext<'_>,
    ) -> Result<ValidationReport, ValidatorFault> {
        let manifest_path = ctx.manifest_path.ok_or_else(|| {
            ValidatorFault::Internal("thin-manifest validator invoked without a manifest".into())
        })?;

        let bytes = fs::read(manifest_path)?;

        let manifest = match ThinManifest::parse(&bytes) {
            Ok(manifest) => manifest,
            Err(parse_err) => {
                return Ok(ValidationReport::error(format!(
                    "startup-dependencies manifest is invalid: {parse_err}"
                )));
            }
        };

        let mut report = ValidationReport::pass();
        for (index, dep) in manifest.dependencies.iter().enumerate() {
            if dep.group.is_empty()
                || dep.name.is_empty()
                || dep.version.is_empty()
                || dep.checksum.is_empty()
            {
                report.add_error(format!(
                    "dependency #{index} ({}) has a blank coordinate field",
                    dep.coordinate()
                ));
            }
        }

        if report.error_messages.is_empty() {
            debug!(
                project = %ctx.project.name,
                dependencies = manifest.dependencies.len(),
                "thin manifest validated"
            );
            report
                .info_messages
                .push(format!("{} external dependencies declared", manifest.dependencies.len()));
        }

        Ok(report)
    }
}
