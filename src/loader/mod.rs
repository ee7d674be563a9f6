//! # Flow Graph Loader
//!
//! Parses a validated scratch directory into flow graphs plus a structural
//! report. The directory layout is one of two closed variants, chosen once
//! per upload by inspection and never mixed mid-upload:
//!
//! - **Hierarchical**: `*.flow` definition files, one flow per file.
//! - **Flat**: `*.job` property files forming one shared job pool; one flow
//!   per terminal job.
//!
//! A directory containing neither kind of file matches no variant and is
//! rejected with [`UploadError::InvalidLoaderVariant`].
//!
//! Structural problems (cycles, duplicate flow ids, undefined dependencies)
//! are policy outcomes: they land as ERROR in the structural report rather
//! than failing the call. The loader never writes to the directory.

pub mod flat;
pub mod graph;
pub mod hierarchical;

pub use graph::{FlowGraph, JobNode};

use crate::error::{Result, UploadError};
use crate::models::flow::PropertySetRecord;
use crate::models::project::Project;
use crate::models::validation::ValidationReport;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FLOW_FILE_SUFFIX: &str = "flow";
pub const JOB_FILE_SUFFIX: &str = "job";
pub const PROPERTIES_FILE_SUFFIX: &str = "properties";

/// The two supported directory layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowLayout {
    Flat,
    Hierarchical,
}

/// A flow-definition file captured for auxiliary persistence (hierarchical
/// layout only).
#[derive(Debug, Clone, PartialEq)]
pub struct FlowFileSource {
    pub file_name: String,
    pub relative_path: PathBuf,
    pub content: Vec<u8>,
}

/// Loader output: the graphs, the structural report, and the
/// layout-specific auxiliary records the committer persists.
#[derive(Debug)]
pub struct LoadedFlows {
    pub layout: FlowLayout,
    pub flows: BTreeMap<String, FlowGraph>,
    pub report: ValidationReport,
    /// Hierarchical layout: raw flow-definition files.
    pub flow_files: Vec<FlowFileSource>,
    /// Flat layout: directory-scoped property sets.
    pub properties: Vec<PropertySetRecord>,
}

/// Inspect the directory once and pick the layout. Any `.flow` file anywhere
/// under the root selects the hierarchical variant; otherwise any `.job`
/// file selects the flat variant.
pub fn detect_layout(dir: &Path) -> Result<FlowLayout> {
    if contains_suffix(dir, FLOW_FILE_SUFFIX)? {
        return Ok(FlowLayout::Hierarchical);
    }
    if contains_suffix(dir, JOB_FILE_SUFFIX)? {
        return Ok(FlowLayout::Flat);
    }
    Err(UploadError::InvalidLoaderVariant)
}

/// Load the directory into flow graphs using the detected layout.
pub fn load(project: &Project, dir: &Path) -> Result<LoadedFlows> {
    let layout = detect_layout(dir)?;
    debug!(project = %project.name, ?layout, "loading flow graphs");
    match layout {
        FlowLayout::Hierarchical => hierarchical::load(dir),
        FlowLayout::Flat => flat::load(dir),
    }
}

fn contains_suffix(dir: &Path, suffix: &str) -> Result<bool> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if contains_suffix(&path, suffix)? {
                return Ok(true);
            }
        } else if has_suffix(&path, suffix) {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.extension().is_some_and(|ext| ext == suffix)
}

/// Recursively collect files with the given suffix, sorted for deterministic
/// traversal.
pub(crate) fn collect_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, suffix: &str, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                walk(&path, suffix, out)?;
            } else if has_suffix(&path, suffix) {
                out.push(path);
            }
        }
        Ok(())
    }
    let mut files = Vec::new();
    walk(dir, suffix, &mut files)?;
    files.sort();
    Ok(files)
}
