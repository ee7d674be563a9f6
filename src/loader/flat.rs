//! Flat-layout loader: `*.job` key=value property files forming one shared
//! job pool, one flow per terminal job.
//!
//! A `.job` file declares its type under the `type` key and its upstream jobs
//! under the comma-separated `dependencies` key. Sibling `*.properties` files
//! are collected as directory-scoped property sets for auxiliary persistence.

use super::graph::{FlowGraph, JobNode};
use super::{collect_with_suffix, LoadedFlows, FlowLayout, JOB_FILE_SUFFIX, PROPERTIES_FILE_SUFFIX};
use crate::error::Result;
use crate::models::flow::PropertySetRecord;
use crate::models::validation::ValidationReport;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const TYPE_KEY: &str = "type";
const DEPENDENCIES_KEY: &str = "dependencies";

/// Parse a `key=value` property file. Blank lines and `#` comments are
/// skipped; whitespace around keys and values is trimmed.
pub(crate) fn parse_properties(content: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            props.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    props
}

pub(crate) fn load(dir: &Path) -> Result<LoadedFlows> {
    let mut report = ValidationReport::pass();
    let mut pool = FlowGraph::new();

    for path in collect_with_suffix(dir, JOB_FILE_SUFFIX)? {
        let job_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let props = parse_properties(&fs::read_to_string(&path)?);
        let job_type = props.get(TYPE_KEY).cloned().unwrap_or_default();
        if job_type.is_empty() {
            report.add_error(format!("job {job_name:?} declares no type"));
        }

        let dependencies: Vec<String> = props
            .get(DEPENDENCIES_KEY)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let config = serde_json::to_value(
            props
                .iter()
                .filter(|(k, _)| k.as_str() != TYPE_KEY && k.as_str() != DEPENDENCIES_KEY)
                .collect::<BTreeMap<_, _>>(),
        )
        .unwrap_or(serde_json::Value::Null);

        let inserted = pool.add_node(JobNode {
            name: job_name.clone(),
            job_type,
            config,
        });
        if !inserted {
            report.add_error(format!("duplicate job name {job_name:?}"));
            continue;
        }
        for dep in dependencies {
            pool.add_dependency(&job_name, &dep);
        }
    }

    for (job, dep) in pool.undefined_dependencies() {
        report.add_error(format!("job {job:?} depends on undefined job {dep:?}"));
    }
    if let Some(cycle) = pool.find_cycle() {
        report.add_error(format!("dependency cycle: {}", cycle.join(" -> ")));
    }

    // One flow per terminal job; the flow graph is the terminal job's
    // dependency closure.
    let mut flows = BTreeMap::new();
    for terminal in pool.terminal_jobs() {
        flows.insert(terminal.clone(), pool.closure_of(&terminal));
    }
    if flows.is_empty() && pool.node_count() > 0 {
        report.add_error("no terminal job found; every job is depended upon");
    }

    let mut properties = Vec::new();
    for path in collect_with_suffix(dir, PROPERTIES_FILE_SUFFIX)? {
        let source = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        properties.push(PropertySetRecord {
            source,
            properties: parse_properties(&fs::read_to_string(&path)?),
        });
    }

    Ok(LoadedFlows {
        layout: FlowLayout::Flat,
        flows,
        report,
        flow_files: Vec::new(),
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::validation::ValidationStatus;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) {
        fs::write(dir.path().join(name), body).unwrap();
    }

    #[test]
    fn builds_one_flow_per_terminal_job() {
        let dir = TempDir::new().unwrap();
        write(&dir, "fetch.job", "type=command\n");
        write(&dir, "transform.job", "type=command\ndependencies=fetch\n");
        write(&dir, "publish.job", "type=command\ndependencies=transform\n");
        write(&dir, "report.job", "type=command\ndependencies=transform\n");

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.report.status, ValidationStatus::Pass);
        let ids: Vec<&String> = loaded.flows.keys().collect();
        assert_eq!(ids, vec!["publish", "report"]);
        assert_eq!(loaded.flows["publish"].node_count(), 3);
        assert_eq!(loaded.flows["report"].node_count(), 3);
    }

    #[test]
    fn cycle_is_a_structural_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.job", "type=command\ndependencies=b\n");
        write(&dir, "b.job", "type=command\ndependencies=a\n");

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.report.status, ValidationStatus::Error);
        assert!(loaded
            .report
            .error_messages
            .iter()
            .any(|m| m.contains("cycle")));
    }

    #[test]
    fn undefined_dependency_is_a_structural_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.job", "type=command\ndependencies=ghost\n");

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.report.status, ValidationStatus::Error);
    }

    #[test]
    fn duplicate_job_names_across_directories_are_errors() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        write(&dir, "a.job", "type=command\n");
        fs::write(dir.path().join("sub/a.job"), "type=command\n").unwrap();

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.report.status, ValidationStatus::Error);
        assert!(loaded
            .report
            .error_messages
            .iter()
            .any(|m| m.contains("duplicate job name")));
    }

    #[test]
    fn properties_files_become_directory_scoped_records() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.job", "type=command\n");
        write(&dir, "common.properties", "retries=3\nqueue = default\n");

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.properties.len(), 1);
        assert_eq!(loaded.properties[0].properties["retries"], "3");
        assert_eq!(loaded.properties[0].properties["queue"], "default");
    }

    #[test]
    fn job_config_keeps_extra_properties() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.job", "type=command\ncommand=echo hi\n# comment\n");

        let loaded = load(dir.path()).unwrap();
        let graph = &loaded.flows["a"];
        assert!(graph.contains("a"));
    }
}
