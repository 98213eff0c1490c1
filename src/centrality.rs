use crate::graph::GraphBuilder;
use crate::model::{CodeElement, SphericalPosition};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Centrality scores per element id. Deterministic functions of graph
/// topology only: identical graphs always produce identical values.
#[derive(Debug, Clone, Default)]
pub struct CentralityScores {
    pub betweenness: BTreeMap<String, f64>,
    pub closeness: BTreeMap<String, f64>,
}

/// Brandes betweenness centrality over the directed graph, normalized to
/// [0, 1] by (n-1)(n-2).
pub fn betweenness_centrality(graph: &DiGraph<String, ()>) -> BTreeMap<String, f64> {
    let n = graph.node_count();
    let mut centrality: Vec<f64> = vec![0.0; n];

    for source in graph.node_indices() {
        let mut stack: Vec<NodeIndex> = Vec::new();
        let mut predecessors: Vec<Vec<NodeIndex>> = vec![Vec::new(); n];
        let mut sigma: Vec<f64> = vec![0.0; n];
        let mut distance: Vec<i64> = vec![-1; n];

        sigma[source.index()] = 1.0;
        distance[source.index()] = 0;

        let mut queue = VecDeque::new();
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for w in graph.neighbors_directed(v, Direction::Outgoing) {
                if distance[w.index()] < 0 {
                    distance[w.index()] = distance[v.index()] + 1;
                    queue.push_back(w);
                }
                if distance[w.index()] == distance[v.index()] + 1 {
                    sigma[w.index()] += sigma[v.index()];
                    predecessors[w.index()].push(v);
                }
            }
        }

        let mut delta: Vec<f64> = vec![0.0; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w.index()] {
                delta[v.index()] +=
                    sigma[v.index()] / sigma[w.index()] * (1.0 + delta[w.index()]);
            }
            if w != source {
                centrality[w.index()] += delta[w.index()];
            }
        }
    }

    let scale = if n > 2 {
        1.0 / ((n - 1) as f64 * (n - 2) as f64)
    } else {
        0.0
    };

    graph
        .node_indices()
        .map(|i| (graph[i].clone(), centrality[i.index()] * scale))
        .collect()
}

/// Wasserman-Faust closeness: the inverse mean distance to reachable nodes,
/// scaled by the reachable share so values stay comparable across components.
pub fn closeness_centrality(graph: &DiGraph<String, ()>) -> BTreeMap<String, f64> {
    let n = graph.node_count();
    let mut scores = BTreeMap::new();

    for source in graph.node_indices() {
        let mut distance: Vec<i64> = vec![-1; n];
        distance[source.index()] = 0;
        let mut queue = VecDeque::new();
        queue.push_back(source);

        let mut total: f64 = 0.0;
        let mut reachable: f64 = 0.0;
        while let Some(v) = queue.pop_front() {
            for w in graph.neighbors_directed(v, Direction::Outgoing) {
                if distance[w.index()] < 0 {
                    distance[w.index()] = distance[v.index()] + 1;
                    total += distance[w.index()] as f64;
                    reachable += 1.0;
                    queue.push_back(w);
                }
            }
        }

        let score = if reachable > 0.0 && total > 0.0 && n > 1 {
            (reachable / total) * (reachable / (n - 1) as f64)
        } else {
            0.0
        };
        scores.insert(graph[source].clone(), score);
    }

    scores
}

pub fn compute(graph: &DiGraph<String, ()>) -> CentralityScores {
    CentralityScores {
        betweenness: betweenness_centrality(graph),
        closeness: closeness_centrality(graph),
    }
}

/// Map every element onto the model sphere, writing positions exactly once.
///
/// θ = betweenness · 2π, φ = closeness · π, r = sphere_radius · stability.
/// Degenerate graphs (fewer than two nodes, or no edges at all) put every
/// element at (sphere_radius, 0, 0) instead of failing.
pub fn embed_elements(
    elements: &mut BTreeMap<String, CodeElement>,
    builder: &GraphBuilder,
    sphere_radius: f64,
) {
    if builder.node_count() < 2 || builder.edge_count() == 0 {
        debug!("degenerate dependency graph, using default embedding");
        for element in elements.values_mut() {
            element.position = Some(SphericalPosition {
                r: sphere_radius,
                theta: 0.0,
                phi: 0.0,
            });
        }
        return;
    }

    let scores = compute(builder.graph());
    for (path, element) in elements.iter_mut() {
        let betweenness = scores.betweenness.get(path).copied().unwrap_or(0.0);
        let closeness = scores.closeness.get(path).copied().unwrap_or(0.0);
        element.position = Some(SphericalPosition {
            r: sphere_radius * element.stability,
            theta: betweenness * 2.0 * std::f64::consts::PI,
            phi: closeness * std::f64::consts::PI,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::model::{ElementKind, SourceFile};
    use std::collections::{BTreeMap, BTreeSet};

    fn build(paths: &[&str], edges: &[(&str, &str)]) -> (BTreeMap<String, CodeElement>, GraphBuilder) {
        let mut elements: BTreeMap<String, CodeElement> = paths
            .iter()
            .map(|path| {
                let file = SourceFile {
                    path: path.to_string(),
                    content: String::new(),
                    kind: ElementKind::Python,
                    size: 0,
                };
                (path.to_string(), CodeElement::from_source(&file))
            })
            .collect();
        let mut raw: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (source, target) in edges {
            raw.entry(source.to_string())
                .or_default()
                .insert(target.to_string());
        }
        let builder = GraphBuilder::build(&mut elements, &raw);
        (elements, builder)
    }

    #[test]
    fn middle_of_chain_has_highest_betweenness() {
        let (_, builder) = build(
            &["a.py", "b.py", "c.py"],
            &[("a.py", "b.py"), ("b.py", "c.py")],
        );
        let betweenness = betweenness_centrality(builder.graph());
        assert!(betweenness["b.py"] > betweenness["a.py"]);
        assert!(betweenness["b.py"] > betweenness["c.py"]);
        // One of two ordered pairs routes through b.
        assert!((betweenness["b.py"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn edgeless_graph_scores_zero_everywhere() {
        let (_, builder) = build(&["a.py", "b.py", "c.py"], &[]);
        let scores = compute(builder.graph());
        assert!(scores.betweenness.values().all(|&v| v == 0.0));
        assert!(scores.closeness.values().all(|&v| v == 0.0));
    }

    #[test]
    fn embedding_stays_within_spherical_bounds() {
        let (mut elements, builder) = build(
            &["a.py", "b.py", "c.py", "d.py"],
            &[("a.py", "b.py"), ("b.py", "c.py"), ("c.py", "d.py"), ("a.py", "d.py")],
        );
        embed_elements(&mut elements, &builder, 1.0);
        for element in elements.values() {
            let position = element.position.unwrap();
            assert!(position.r >= 0.0 && position.r <= 1.0);
            assert!(position.theta >= 0.0 && position.theta <= 2.0 * std::f64::consts::PI);
            assert!(position.phi >= 0.0 && position.phi <= std::f64::consts::PI);
        }
    }

    #[test]
    fn degenerate_graph_gets_default_positions() {
        let (mut elements, builder) = build(&["a.py", "b.py"], &[]);
        embed_elements(&mut elements, &builder, 2.0);
        for element in elements.values() {
            let position = element.position.unwrap();
            assert_eq!(position.r, 2.0);
            assert_eq!(position.theta, 0.0);
            assert_eq!(position.phi, 0.0);
        }
    }

    #[test]
    fn identical_graphs_produce_identical_scores() {
        let (_, b1) = build(&["a.py", "b.py", "c.py"], &[("a.py", "b.py"), ("b.py", "c.py")]);
        let (_, b2) = build(&["a.py", "b.py", "c.py"], &[("a.py", "b.py"), ("b.py", "c.py")]);
        assert_eq!(compute(b1.graph()).betweenness, compute(b2.graph()).betweenness);
        assert_eq!(compute(b1.graph()).closeness, compute(b2.graph()).closeness);
    }
}
