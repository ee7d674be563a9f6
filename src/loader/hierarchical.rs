//! Hierarchical-layout loader: one `*.flow` definition file per flow.
//!
//! A flow file is a JSON document:
//!
//! ```json
//! { "nodes": [ { "name": "a", "type": "command", "dependsOn": ["b"] } ] }
//! ```
//!
//! The flow id is the file stem. Duplicate flow ids (two files with the same
//! stem anywhere under the root), per-flow cycles and references to
//! undefined nodes are structural errors. Raw file bytes are captured for
//! the committer's per-file version records.

use super::graph::{FlowGraph, JobNode};
use super::{collect_with_suffix, FlowFileSource, FlowLayout, LoadedFlows, FLOW_FILE_SUFFIX};
use crate::error::Result;
use crate::models::validation::ValidationReport;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct FlowDocument {
    #[serde(default)]
    nodes: Vec<FlowNodeDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowNodeDocument {
    name: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    config: serde_json::Value,
    #[serde(default)]
    depends_on: Vec<String>,
}

pub(crate) fn load(dir: &Path) -> Result<LoadedFlows> {
    let mut report = ValidationReport::pass();
    let mut flows = BTreeMap::new();
    let mut flow_files = Vec::new();

    for path in collect_with_suffix(dir, FLOW_FILE_SUFFIX)? {
        let flow_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative_path = path.strip_prefix(dir).unwrap_or(&path).to_path_buf();
        let content = fs::read(&path)?;

        if flows.contains_key(&flow_id) {
            report.add_error(format!("duplicate flow id {flow_id:?}"));
            continue;
        }

        let document: FlowDocument = match serde_json::from_slice(&content) {
            Ok(doc) => doc,
            Err(err) => {
                report.add_error(format!("flow {flow_id:?} is not a valid flow document: {err}"));
                continue;
            }
        };

        let mut graph = FlowGraph::new();
        for node in &document.nodes {
            let inserted = graph.add_node(JobNode {
                name: node.name.clone(),
                job_type: node.node_type.clone(),
                config: node.config.clone(),
            });
            if !inserted {
                report.add_error(format!(
                    "flow {flow_id:?} defines node {:?} more than once",
                    node.name
                ));
            }
        }
        for node in &document.nodes {
            for dep in &node.depends_on {
                graph.add_dependency(&node.name, dep);
            }
        }

        for (job, dep) in graph.undefined_dependencies() {
            report.add_error(format!(
                "flow {flow_id:?}: node {job:?} depends on undefined node {dep:?}"
            ));
        }
        if let Some(cycle) = graph.find_cycle() {
            report.add_error(format!(
                "flow {flow_id:?}: dependency cycle: {}",
                cycle.join(" -> ")
            ));
        }
        if graph.node_count() == 0 {
            report.add_warning(format!("flow {flow_id:?} defines no nodes"));
        }

        flows.insert(flow_id, graph);
        flow_files.push(FlowFileSource {
            file_name,
            relative_path,
            content,
        });
    }

    Ok(LoadedFlows {
        layout: FlowLayout::Hierarchical,
        flows,
        report,
        flow_files,
        properties: Vec::new(),
    })
}
