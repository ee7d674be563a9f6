//! In-memory job-dependency graph for a single flow.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One job node in a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobNode {
    pub name: String,
    pub job_type: String,
    /// Free-form job configuration (flattened properties or the node's
    /// `config` object).
    #[serde(default)]
    pub config: serde_json::Value,
}

/// A directed job-dependency graph. Edges point from a job to the jobs it
/// depends on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    nodes: BTreeMap<String, JobNode>,
    /// job name -> names of its dependencies
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node; returns false if a node with this name already exists.
    pub fn add_node(&mut self, node: JobNode) -> bool {
        if self.nodes.contains_key(&node.name) {
            return false;
        }
        self.edges.entry(node.name.clone()).or_default();
        self.nodes.insert(node.name.clone(), node);
        true
    }

    pub fn add_dependency(&mut self, job: &str, depends_on: &str) {
        self.edges
            .entry(job.to_string())
            .or_default()
            .insert(depends_on.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_names(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn dependencies_of(&self, job: &str) -> impl Iterator<Item = &String> {
        self.edges.get(job).into_iter().flatten()
    }

    /// Dependency names referenced by some job but not defined as nodes.
    pub fn undefined_dependencies(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for (job, deps) in &self.edges {
            for dep in deps {
                if !self.nodes.contains_key(dep) {
                    missing.push((job.clone(), dep.clone()));
                }
            }
        }
        missing
    }

    /// Find a dependency cycle, if any, returned as the chain of job names.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        fn visit(
            graph: &FlowGraph,
            job: &str,
            marks: &mut BTreeMap<String, Mark>,
            stack: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            match marks.get(job) {
                Some(Mark::Done) => return None,
                Some(Mark::InProgress) => {
                    let start = stack.iter().position(|j| j == job).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(job.to_string());
                    return Some(cycle);
                }
                None => {}
            }
            marks.insert(job.to_string(), Mark::InProgress);
            stack.push(job.to_string());
            if let Some(deps) = graph.edges.get(job) {
                for dep in deps {
                    // Undefined deps are reported separately, not walked.
                    if graph.nodes.contains_key(dep) {
                        if let Some(cycle) = visit(graph, dep, marks, stack) {
                            return Some(cycle);
                        }
                    }
                }
            }
            stack.pop();
            marks.insert(job.to_string(), Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        for job in self.nodes.keys() {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(self, job, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    /// Jobs that no other job depends on: the flow's terminal jobs.
    pub fn terminal_jobs(&self) -> Vec<String> {
        let mut depended_on: BTreeSet<&String> = BTreeSet::new();
        for deps in self.edges.values() {
            depended_on.extend(deps.iter());
        }
        self.nodes
            .keys()
            .filter(|name| !depended_on.contains(name))
            .cloned()
            .collect()
    }

    /// The subgraph reachable from `root` following dependency edges.
    pub fn closure_of(&self, root: &str) -> FlowGraph {
        let mut result = FlowGraph::new();
        let mut queue = vec![root.to_string()];
        while let Some(job) = queue.pop() {
            if result.contains(&job) {
                continue;
            }
            if let Some(node) = self.nodes.get(&job) {
                result.add_node(node.clone());
            }
            if let Some(deps) = self.edges.get(&job) {
                for dep in deps {
                    result.add_dependency(&job, dep);
                    if self.nodes.contains_key(dep) && !result.contains(dep) {
                        queue.push(dep.clone());
                    }
                }
            }
        }
        result
    }

    /// Serialize for the flow record.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("graph serialization is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> JobNode {
        JobNode {
            name: name.to_string(),
            job_type: "command".to_string(),
            config: serde_json::Value::Null,
        }
    }

    #[test]
    fn detects_simple_cycle() {
        let mut graph = FlowGraph::new();
        graph.add_node(node("a"));
        graph.add_node(node("b"));
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "a");
        let cycle = graph.find_cycle().unwrap();
        assert!(cycle.len() >= 2);
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let mut graph = FlowGraph::new();
        graph.add_node(node("a"));
        graph.add_node(node("b"));
        graph.add_node(node("c"));
        graph.add_dependency("c", "b");
        graph.add_dependency("b", "a");
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut graph = FlowGraph::new();
        graph.add_node(node("a"));
        graph.add_dependency("a", "a");
        assert!(graph.find_cycle().is_some());
    }

    #[test]
    fn terminal_jobs_are_the_undepended_ones() {
        let mut graph = FlowGraph::new();
        graph.add_node(node("fetch"));
        graph.add_node(node("transform"));
        graph.add_node(node("publish"));
        graph.add_dependency("transform", "fetch");
        graph.add_dependency("publish", "transform");
        assert_eq!(graph.terminal_jobs(), vec!["publish".to_string()]);
    }

    #[test]
    fn closure_collects_reachable_subgraph() {
        let mut graph = FlowGraph::new();
        for name in ["a", "b", "c", "unrelated"] {
            graph.add_node(node(name));
        }
        graph.add_dependency("c", "b");
        graph.add_dependency("b", "a");
        let closure = graph.closure_of("c");
        assert_eq!(closure.node_count(), 3);
        assert!(!closure.contains("unrelated"));
    }

    #[test]
    fn duplicate_node_insert_is_rejected() {
        let mut graph = FlowGraph::new();
        assert!(graph.add_node(node("a")));
        assert!(!graph.add_node(node("a")));
    }

    #[test]
    fn undefined_dependencies_are_reported() {
        let mut graph = FlowGraph::new();
        graph.add_node(node("a"));
        graph.add_dependency("a", "ghost");
        assert_eq!(
            graph.undefined_dependencies(),
            vec![("a".to_string(), "ghost".to_string())]
        );
    }
}
