//! In-memory port graph, rebuilt from scratch for every snapshot.
//!
//! [`PortGraph`] wraps a `petgraph::DiGraph` with a stable code → index
//! mapping. Node order is snapshot order, so `NodeIndex::index()` doubles as
//! the row index into feature matrices and score vectors.
//!
//! Routes that reference an unknown port or loop back to their origin are
//! dropped with a warning; the build always succeeds.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{PortNode, RouteEdge};
use crate::risk::models::NetworkRisk;

/// Why a route was left out of the graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphBuildError {
    #[error("route {origin} -> {dest} references unknown port {missing}")]
    UnknownPort {
        origin: String,
        dest: String,
        missing: String,
    },

    #[error("route {code} -> {code} is a self-loop")]
    SelfLoop { code: String },
}

/// Port network for a single snapshot.
#[derive(Debug, Clone, Default)]
pub struct PortGraph {
    /// Directed graph; edges point origin → dest
    pub graph: DiGraph<PortNode, RouteEdge>,
    code_to_index: HashMap<String, NodeIndex>,
    dropped: Vec<GraphBuildError>,
    adjacency: OnceLock<Vec<Vec<usize>>>,
}

impl PortGraph {
    /// Build a graph from ports and routes.
    ///
    /// - Duplicate port codes keep the first occurrence.
    /// - Routes whose endpoints do not both resolve are dropped and logged;
    ///   no node is ever invented for a dangling route.
    /// - Self-loops are dropped and logged.
    /// - Duplicate routes (same unordered port pair) are dropped silently.
    pub fn build(nodes: Vec<PortNode>, edges: Vec<RouteEdge>) -> Self {
        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut code_to_index = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if code_to_index.contains_key(&node.code) {
                warn!(port = %node.code, "duplicate port code in snapshot, keeping first");
                continue;
            }
            let code = node.code.clone();
            let idx = graph.add_node(node);
            code_to_index.insert(code, idx);
        }

        let mut dropped = Vec::new();
        let mut seen_pairs: HashSet<(usize, usize)> = HashSet::with_capacity(edges.len());

        for edge in edges {
            let origin = code_to_index.get(&edge.origin_code).copied();
            let dest = code_to_index.get(&edge.dest_code).copied();

            let (from, to) = match (origin, dest) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    let missing = if origin.is_none() {
                        edge.origin_code.clone()
                    } else {
                        edge.dest_code.clone()
                    };
                    let err = GraphBuildError::UnknownPort {
                        origin: edge.origin_code,
                        dest: edge.dest_code,
                        missing,
                    };
                    warn!("dropping route: {}", err);
                    dropped.push(err);
                    continue;
                }
            };

            if from == to {
                let err = GraphBuildError::SelfLoop {
                    code: edge.origin_code,
                };
                warn!("dropping route: {}", err);
                dropped.push(err);
                continue;
            }

            let pair = if from.index() < to.index() {
                (from.index(), to.index())
            } else {
                (to.index(), from.index())
            };
            if !seen_pairs.insert(pair) {
                continue;
            }

            graph.add_edge(from, to, edge);
        }

        debug!(
            "Built port graph: {} ports, {} routes, {} dropped",
            graph.node_count(),
            graph.edge_count(),
            dropped.len()
        );

        Self {
            graph,
            code_to_index,
            dropped,
            adjacency: OnceLock::new(),
        }
    }

    /// Whether the graph has no ports at all.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of ports.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of resolved, deduplicated routes.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Row index of a port code.
    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.code_to_index.get(code).map(|idx| idx.index())
    }

    /// Port at the given row index.
    pub fn port(&self, index: usize) -> Option<&PortNode> {
        self.graph.node_weight(NodeIndex::new(index))
    }

    /// Ports in snapshot order.
    pub fn ports(&self) -> impl Iterator<Item = &PortNode> + '_ {
        self.graph.node_weights()
    }

    /// Routes as `(origin_index, dest_index, route)` in insertion order.
    pub fn routes(&self) -> impl Iterator<Item = (usize, usize, &RouteEdge)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), e.weight()))
    }

    /// Routes rejected during the build.
    pub fn dropped_routes(&self) -> &[GraphBuildError] {
        &self.dropped
    }

    /// Attach predicted scores by port code. Ports missing from `risk` are
    /// left unscored.
    pub fn annotate_risk(&mut self, risk: &NetworkRisk) {
        let scores = risk.scores_by_code();
        for port in self.graph.node_weights_mut() {
            port.risk_score = scores.get(port.code.as_str()).copied();
        }
    }

    /// Undirected neighbour lists, built on first use.
    pub fn adjacency(&self) -> &[Vec<usize>] {
        self.adjacency.get_or_init(|| {
            let mut adj = vec![Vec::new(); self.graph.node_count()];
            for (from, to, _) in self.routes() {
                adj[from].push(to);
                adj[to].push(from);
            }
            adj
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(codes: &[&str]) -> Vec<PortNode> {
        codes.iter().map(|c| PortNode::new(*c, 0.5)).collect()
    }

    #[test]
    fn test_build_resolves_routes() {
        let g = PortGraph::build(
            ports(&["A", "B", "C"]),
            vec![RouteEdge::new("A", "B"), RouteEdge::new("B", "C")],
        );
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.index_of("C"), Some(2));
        assert!(g.dropped_routes().is_empty());
    }

    #[test]
    fn test_unknown_port_route_dropped_not_invented() {
        let g = PortGraph::build(
            ports(&["A", "B"]),
            vec![RouteEdge::new("A", "B"), RouteEdge::new("A", "ZZ")],
        );
        assert_eq!(g.node_count(), 2, "no node may be invented for a dangling route");
        assert_eq!(g.edge_count(), 1);
        assert_eq!(
            g.dropped_routes(),
            &[GraphBuildError::UnknownPort {
                origin: "A".into(),
                dest: "ZZ".into(),
                missing: "ZZ".into(),
            }]
        );
    }

    #[test]
    fn test_self_loop_dropped() {
        let g = PortGraph::build(ports(&["A"]), vec![RouteEdge::new("A", "A")]);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(
            g.dropped_routes(),
            &[GraphBuildError::SelfLoop { code: "A".into() }]
        );
    }

    #[test]
    fn test_duplicate_routes_deduplicated_silently() {
        let g = PortGraph::build(
            ports(&["A", "B"]),
            vec![
                RouteEdge::new("A", "B"),
                RouteEdge::new("A", "B"),
                RouteEdge::new("B", "A"),
            ],
        );
        assert_eq!(g.edge_count(), 1);
        assert!(g.dropped_routes().is_empty());
    }

    #[test]
    fn test_duplicate_port_keeps_first() {
        let mut nodes = ports(&["A", "B"]);
        let mut dup = PortNode::new("A", 0.9);
        dup.is_origin = true;
        nodes.push(dup);

        let g = PortGraph::build(nodes, vec![]);
        assert_eq!(g.node_count(), 2);
        let a = g.port(g.index_of("A").unwrap()).unwrap();
        assert_eq!(a.congestion_level, 0.5);
        assert!(!a.is_origin);
    }

    #[test]
    fn test_empty_graph() {
        let g = PortGraph::build(vec![], vec![RouteEdge::new("A", "B")]);
        assert!(g.is_empty());
        assert_eq!(g.edge_count(), 0);
        assert!(g.adjacency().is_empty());
    }

    #[test]
    fn test_adjacency_is_undirected() {
        let g = PortGraph::build(
            ports(&["A", "B", "C"]),
            vec![RouteEdge::new("A", "B"), RouteEdge::new("C", "B")],
        );
        let adj = g.adjacency();
        assert_eq!(adj[0], vec![1]);
        assert_eq!(adj[1].len(), 2);
        assert!(adj[1].contains(&0) && adj[1].contains(&2));
        assert_eq!(adj[2], vec![1]);
    }

    #[test]
    fn test_annotate_risk_by_code() {
        use crate::propagation::BackendVariant;
        use crate::risk::models::{NodePrediction, RiskLevel};

        let mut g = PortGraph::build(ports(&["A", "B", "C"]), vec![]);
        let mut risk = NetworkRisk::empty(BackendVariant::Averaging);
        for (code, score) in [("C", 0.9), ("A", 0.25)] {
            risk.predictions.push(NodePrediction {
                port_code: code.into(),
                risk_score: score,
                risk_level: RiskLevel::from_score(score),
                congestion_input: 0.5,
                is_origin: false,
            });
        }

        g.annotate_risk(&risk);
        let scores: Vec<_> = g.ports().map(|p| p.risk_score).collect();
        assert_eq!(scores, vec![Some(0.25), None, Some(0.9)]);
    }

    #[test]
    fn test_disconnected_graph_allowed() {
        let g = PortGraph::build(
            ports(&["A", "B", "C", "D"]),
            vec![RouteEdge::new("A", "B"), RouteEdge::new("C", "D")],
        );
        assert_eq!(g.edge_count(), 2);
        assert!(g.adjacency()[0].iter().all(|&n| n == 1));
    }
}
