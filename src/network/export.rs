//! Visualization export.
//!
//! Projects a [`PortGraph`] onto a flat node/edge structure that front-end
//! graph libraries can draw directly. Pure projection: no scoring happens
//! here; scores come from [`PortGraph::annotate_risk`].

use serde::{Deserialize, Serialize};

use super::models::unit_interval;
use super::store::PortGraph;

const BASE_NODE_SIZE: f64 = 10.0;
const CONGESTION_NODE_SIZE: f64 = 20.0;
const DISTANCE_WEIGHT_SCALE: f64 = 1000.0;

/// A port positioned for drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNode {
    pub id: String,
    pub label: String,
    /// `lng + 180`
    pub x: f64,
    /// `90 - lat` (screen y grows downwards)
    pub y: f64,
    pub congestion: f64,
    pub is_origin: bool,
    /// Grows with congestion
    pub size: f64,
    /// Risk on a 0–100 scale, when the graph was annotated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
}

/// A route drawn between two ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualEdge {
    pub source: String,
    pub target: String,
    /// Distance in thousands of nautical miles
    pub weight: f64,
    pub transit_time: f64,
    pub weather_risk: f64,
}

/// Visualization-ready network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStructure {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Project the graph for visualization.
///
/// Node and edge counts always match the graph's resolved ports and routes.
pub fn export(graph: &PortGraph) -> NetworkStructure {
    let nodes: Vec<VisualNode> = graph
        .ports()
        .map(|port| {
            let congestion = unit_interval(port.congestion_level);
            VisualNode {
                id: port.code.clone(),
                label: port.code.clone(),
                x: bounded(port.lng, 180.0) + 180.0,
                y: 90.0 - bounded(port.lat, 90.0),
                congestion,
                is_origin: port.is_origin,
                size: BASE_NODE_SIZE + congestion * CONGESTION_NODE_SIZE,
                risk_score: port.risk_score.map(|s| unit_interval(s) * 100.0),
            }
        })
        .collect();

    let edges: Vec<VisualEdge> = graph
        .routes()
        .map(|(_, _, route)| VisualEdge {
            source: route.origin_code.clone(),
            target: route.dest_code.clone(),
            weight: finite_or_zero(route.distance_nm) / DISTANCE_WEIGHT_SCALE,
            transit_time: finite_or_zero(route.transit_time_days),
            weather_risk: unit_interval(route.weather_risk),
        })
        .collect();

    NetworkStructure {
        node_count: nodes.len(),
        edge_count: edges.len(),
        nodes,
        edges,
    }
}

/// Clamp a coordinate into `[-limit, limit]`, mapping NaN to 0.
fn bounded(value: f64, limit: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-limit, limit)
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::models::{PortNode, RouteEdge};
    use crate::propagation::BackendVariant;
    use crate::risk::models::{NetworkRisk, NodePrediction, RiskLevel, RiskLevelCounts};

    fn sample_graph() -> PortGraph {
        let mut a = PortNode::new("SGSIN", 0.5);
        a.lat = 1.3;
        a.lng = 103.8;
        let b = PortNode::new("NLRTM", 0.0);
        let mut route = RouteEdge::new("SGSIN", "NLRTM");
        route.distance_nm = 8300.0;
        route.weather_risk = 0.2;
        PortGraph::build(vec![a, b], vec![route, RouteEdge::new("SGSIN", "XXXXX")])
    }

    #[test]
    fn test_export_counts_match_graph() {
        let graph = sample_graph();
        let out = export(&graph);
        assert_eq!(out.node_count, graph.node_count());
        assert_eq!(out.edge_count, graph.edge_count());
        assert_eq!(out.edges.len(), 1, "dangling route must not be exported");
    }

    #[test]
    fn test_export_positions_and_sizes() {
        let out = export(&sample_graph());
        let sg = &out.nodes[0];
        assert!((sg.x - 283.8).abs() < 1e-9);
        assert!((sg.y - 88.7).abs() < 1e-9);
        assert_eq!(sg.size, 20.0);
        assert_eq!(out.nodes[1].size, 10.0);
        assert!(sg.risk_score.is_none());

        let edge = &out.edges[0];
        assert!((edge.weight - 8.3).abs() < 1e-9);
        assert_eq!(edge.weather_risk, 0.2);
    }

    #[test]
    fn test_export_attaches_risk_scores() {
        let risk = NetworkRisk {
            predictions: vec![NodePrediction {
                port_code: "NLRTM".into(),
                risk_score: 0.42,
                risk_level: RiskLevel::Medium,
                congestion_input: 0.0,
                is_origin: false,
            }],
            graph_risk: 0.42,
            level_counts: RiskLevelCounts::default(),
            total_nodes: 2,
            total_edges: 1,
            backend_variant: BackendVariant::Averaging,
        };
        let mut graph = sample_graph();
        graph.annotate_risk(&risk);
        let out = export(&graph);
        assert!(out.nodes[0].risk_score.is_none());
        assert!((out.nodes[1].risk_score.unwrap() - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_export_bounds_non_finite_inputs() {
        let mut port = PortNode::new("BADGPS", f64::NAN);
        port.lat = f64::NAN;
        port.lng = f64::INFINITY;
        let mut far = PortNode::new("FAR", f64::INFINITY);
        far.lat = -200.0;
        far.lng = f64::NEG_INFINITY;
        let mut route = RouteEdge::new("BADGPS", "FAR");
        route.distance_nm = f64::INFINITY;
        route.transit_time_days = f64::NAN;
        let out = export(&PortGraph::build(vec![port, far], vec![route]));

        let bad = &out.nodes[0];
        assert_eq!((bad.x, bad.y), (360.0, 90.0));
        assert_eq!(bad.congestion, 0.0);
        assert_eq!(bad.size, 10.0);
        let far = &out.nodes[1];
        assert_eq!((far.x, far.y), (0.0, 180.0));
        assert_eq!(far.congestion, 1.0);
        assert_eq!(far.size, 30.0);
        assert_eq!(out.edges[0].weight, 0.0);
        assert_eq!(out.edges[0].transit_time, 0.0);

        let json = serde_json::to_string(&out).unwrap();
        assert!(!json.contains("null"));
    }

    #[test]
    fn test_export_empty_graph() {
        let out = export(&PortGraph::build(vec![], vec![]));
        assert_eq!(out.node_count, 0);
        assert_eq!(out.edge_count, 0);
    }
}
