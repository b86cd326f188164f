//! Feature normalization.
//!
//! Maps raw port and route telemetry to bounded feature vectors and packs a
//! [`PortGraph`] into [`GraphTensors`], the one numeric representation every
//! propagation backend consumes. Every feature is clipped to [0, 1] and
//! non-finite input is bounded here so that backends never see it.

use super::models::{unit_interval, PortNode, RouteEdge};
use super::store::PortGraph;

/// Width of a node feature row.
pub const NODE_FEATURES: usize = 6;
/// Width of an edge feature row.
pub const EDGE_FEATURES: usize = 4;

/// Column of the congestion feature in a node row.
pub const CONGESTION: usize = 0;
/// Column of the weather-risk feature in an edge row.
pub const WEATHER_RISK: usize = 2;

pub const NODE_FEATURE_NAMES: [&str; NODE_FEATURES] = [
    "congestion_level",
    "wait_time_hours",
    "capacity_teus",
    "latitude",
    "longitude",
    "is_origin_port",
];

pub const EDGE_FEATURE_NAMES: [&str; EDGE_FEATURES] = [
    "distance_nm",
    "transit_time_days",
    "weather_risk",
    "current_delay",
];

const WAIT_HOURS_SCALE: f64 = 48.0;
const CAPACITY_TEU_SCALE: f64 = 50_000_000.0;
const DISTANCE_NM_SCALE: f64 = 10_000.0;
const TRANSIT_DAYS_SCALE: f64 = 30.0;
const DELAY_DAYS_SCALE: f64 = 10.0;

/// `[congestion, wait/48, capacity/50e6, (lat+90)/180, (lng+180)/360, is_origin]`
pub fn normalize_node(port: &PortNode) -> [f32; NODE_FEATURES] {
    [
        unit_interval(port.congestion_level) as f32,
        unit_interval(port.wait_time_hours / WAIT_HOURS_SCALE) as f32,
        unit_interval(port.capacity_teu / CAPACITY_TEU_SCALE) as f32,
        unit_interval((port.lat + 90.0) / 180.0) as f32,
        unit_interval((port.lng + 180.0) / 360.0) as f32,
        if port.is_origin { 1.0 } else { 0.0 },
    ]
}

/// `[distance/10000, transit/30, weather_risk, delay/10]`
pub fn normalize_edge(route: &RouteEdge) -> [f32; EDGE_FEATURES] {
    [
        unit_interval(route.distance_nm / DISTANCE_NM_SCALE) as f32,
        unit_interval(route.transit_time_days / TRANSIT_DAYS_SCALE) as f32,
        unit_interval(route.weather_risk) as f32,
        unit_interval(route.current_delay_days / DELAY_DAYS_SCALE) as f32,
    ]
}

/// Normalized graph in the layout backends consume.
///
/// `edge_index` holds `(source, target)` row indices. Each route contributes
/// two entries, one per direction, sharing the same feature row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphTensors {
    pub node_features: Vec<[f32; NODE_FEATURES]>,
    pub edge_index: Vec<(usize, usize)>,
    pub edge_features: Vec<[f32; EDGE_FEATURES]>,
}

impl GraphTensors {
    /// Normalize every port and route of `graph`.
    pub fn from_graph(graph: &PortGraph) -> Self {
        let node_features = graph.ports().map(normalize_node).collect();

        let mut edge_index = Vec::with_capacity(graph.edge_count() * 2);
        let mut edge_features = Vec::with_capacity(graph.edge_count() * 2);
        for (from, to, route) in graph.routes() {
            let features = normalize_edge(route);
            edge_index.push((from, to));
            edge_features.push(features);
            edge_index.push((to, from));
            edge_features.push(features);
        }

        Self {
            node_features,
            edge_index,
            edge_features,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.node_features.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.len()
    }

    /// Node features flattened row-major.
    pub fn flat_node_features(&self) -> Vec<f32> {
        self.node_features.iter().flatten().copied().collect()
    }

    /// Edge features flattened row-major.
    pub fn flat_edge_features(&self) -> Vec<f32> {
        self.edge_features.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(congestion: f64, wait: f64, capacity: f64, lat: f64, lng: f64) -> PortNode {
        PortNode {
            code: "P".into(),
            congestion_level: congestion,
            wait_time_hours: wait,
            capacity_teu: capacity,
            lat,
            lng,
            is_origin: true,
            risk_score: None,
        }
    }

    #[test]
    fn test_normalize_node_scales() {
        let f = normalize_node(&port(0.8, 24.0, 25_000_000.0, 0.0, 0.0));
        assert_eq!(f, [0.8, 0.5, 0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_normalize_node_clips_out_of_range() {
        let f = normalize_node(&port(1.7, 500.0, 9.0e9, 95.0, -200.0));
        assert_eq!(f, [1.0, 1.0, 1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_normalize_node_bounds_non_finite() {
        let f = normalize_node(&port(f64::NAN, f64::INFINITY, f64::NEG_INFINITY, f64::NAN, 0.0));
        for v in f {
            assert!(v.is_finite() && (0.0..=1.0).contains(&v), "feature {} out of range", v);
        }
        assert_eq!(f[0], 0.0);
        assert_eq!(f[1], 1.0);
        assert_eq!(f[2], 0.0);
    }

    #[test]
    fn test_normalize_edge_scales_and_clips() {
        let route = RouteEdge {
            origin_code: "A".into(),
            dest_code: "B".into(),
            distance_nm: 5000.0,
            transit_time_days: 60.0,
            weather_risk: 0.3,
            current_delay_days: 2.0,
        };
        let f = normalize_edge(&route);
        assert_eq!(f[0], 0.5);
        assert_eq!(f[1], 1.0);
        assert!((f[2] - 0.3).abs() < 1e-6);
        assert!((f[3] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_graph_tensors_emit_both_directions() {
        let graph = PortGraph::build(
            vec![PortNode::new("A", 0.9), PortNode::new("B", 0.1)],
            vec![RouteEdge::new("A", "B")],
        );
        let t = GraphTensors::from_graph(&graph);
        assert_eq!(t.num_nodes(), 2);
        assert_eq!(t.edge_index, vec![(0, 1), (1, 0)]);
        assert_eq!(t.edge_features[0], t.edge_features[1]);
        assert_eq!(t.flat_node_features().len(), 2 * NODE_FEATURES);
        assert_eq!(t.flat_edge_features().len(), 2 * EDGE_FEATURES);
    }
}
