use crate::model::CodeElement;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const RESOLVE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "c", "cpp", "h",
];

/// Builds the directed dependency graph over known elements.
///
/// An edge a→b exists only when b's identifier resolves to a known element
/// id; unresolved external imports are dropped and never create phantom
/// nodes. Self-loops are kept but recorded as anomalies.
pub struct GraphBuilder {
    graph: DiGraph<String, ()>,
    indices: BTreeMap<String, NodeIndex>,
    self_loops: Vec<String>,
}

impl GraphBuilder {
    /// Assemble the graph and populate each element's dependency/dependent
    /// sets from the resolved edges.
    pub fn build(
        elements: &mut BTreeMap<String, CodeElement>,
        raw_dependencies: &BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut indices = BTreeMap::new();
        let mut self_loops = Vec::new();

        for path in elements.keys() {
            let index = graph.add_node(path.clone());
            indices.insert(path.clone(), index);
        }

        let stems = stem_index(elements);

        let mut resolved_edges: Vec<(String, String)> = Vec::new();
        for (source, identifiers) in raw_dependencies {
            let Some(&source_index) = indices.get(source) else {
                continue;
            };
            for identifier in identifiers {
                let Some(target) = resolve(identifier, elements, &stems) else {
                    debug!(source, identifier, "dropping unresolved import");
                    continue;
                };
                let target_index = indices[&target];

                if graph.find_edge(source_index, target_index).is_some() {
                    continue;
                }
                graph.add_edge(source_index, target_index, ());
                if source == &target {
                    self_loops.push(source.clone());
                }
                resolved_edges.push((source.clone(), target));
            }
        }

        for (source, target) in resolved_edges {
            if let Some(element) = elements.get_mut(&source) {
                element.dependencies.insert(target.clone());
            }
            if let Some(element) = elements.get_mut(&target) {
                element.dependents.insert(source);
            }
        }

        for element in elements.values_mut() {
            element.score_stability();
        }

        Self {
            graph,
            indices,
            self_loops,
        }
    }

    pub fn graph(&self) -> &DiGraph<String, ()> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn self_loops(&self) -> &[String] {
        &self.self_loops
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.indices
            .get(id)
            .map(|&i| self.graph.neighbors_directed(i, Direction::Incoming).count())
            .unwrap_or(0)
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.indices
            .get(id)
            .map(|&i| self.graph.neighbors_directed(i, Direction::Outgoing).count())
            .unwrap_or(0)
    }
}

fn stem_index(elements: &BTreeMap<String, CodeElement>) -> BTreeMap<String, Vec<String>> {
    let mut stems: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in elements.keys() {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let stem = file_name.rsplit_once('.').map_or(file_name, |(s, _)| s);
        stems.entry(stem.to_string()).or_default().push(path.clone());
    }
    stems
}

/// Resolve a raw identifier to a known element id, or None.
///
/// Tries, in order: exact path, path plus a known extension, dotted module
/// path converted to a file path, and finally a file-stem match (first in
/// lexicographic order when ambiguous).
fn resolve(
    identifier: &str,
    elements: &BTreeMap<String, CodeElement>,
    stems: &BTreeMap<String, Vec<String>>,
) -> Option<String> {
    if elements.contains_key(identifier) {
        return Some(identifier.to_string());
    }

    for ext in RESOLVE_EXTENSIONS {
        let candidate = format!("{identifier}.{ext}");
        if elements.contains_key(&candidate) {
            return Some(candidate);
        }
    }

    if identifier.contains('.') && !identifier.contains('/') {
        let as_path = identifier.replace('.', "/");
        if elements.contains_key(&as_path) {
            return Some(as_path);
        }
        for ext in RESOLVE_EXTENSIONS {
            let candidate = format!("{as_path}.{ext}");
            if elements.contains_key(&candidate) {
                return Some(candidate);
            }
        }
    }

    if !identifier.contains('/') && !identifier.contains('.') {
        if let Some(matches) = stems.get(identifier) {
            return matches.first().cloned();
        }
    }

    None
}
