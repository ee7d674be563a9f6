//! # Format Detector
//!
//! Classifies an extracted project directory as Fat (self-contained) or Thin
//! (dependency-referencing). The predicate is pure: a Thin archive is marked
//! by the presence of the startup-dependencies manifest at a well-known path
//! under the project root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Well-known manifest location marking a Thin archive.
pub const THIN_MANIFEST_PATH: &str = "app-meta/startup-dependencies.json";

/// Archive format, decided once per upload and threaded explicitly through
/// the rest of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveKind {
    /// All runtime dependencies are bundled in the archive.
    Fat,
    /// External dependency coordinates are resolved at execution time.
    Thin { manifest_path: PathBuf },
}

impl ArchiveKind {
    pub fn is_thin(&self) -> bool {
        matches!(self, ArchiveKind::Thin { .. })
    }

    pub fn manifest_path(&self) -> Option<&Path> {
        match self {
            ArchiveKind::Fat => None,
            ArchiveKind::Thin { manifest_path } => Some(manifest_path),
        }
    }
}

/// Classify the extracted directory.
pub fn detect(dir: &Path) -> ArchiveKind {
    let manifest = dir.join(THIN_MANIFEST_PATH);
    if manifest.is_file() {
        ArchiveKind::Thin {
            manifest_path: manifest,
        }
    } else {
        ArchiveKind::Fat
    }
}

/// External artifact coordinates for one unbundled dependency. Every field is
/// required; a manifest entry missing any of them fails deserialization and
/// is reported as a validation ERROR by the thin-manifest validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyCoordinate {
    pub group: String,
    pub name: String,
    pub version: String,
    pub checksum: String,
}

impl DependencyCoordinate {
    /// Canonical `group:name:version` form used in log lines and messages.
    pub fn coordinate(&self) -> String {
        format!("{}:{}:{}", self.group, self.name, self.version)
    }
}

/// The Thin archive's root manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinManifest {
    pub dependencies: Vec<DependencyCoordinate>,
}

impl ThinManifest {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
