//! Network-wide risk prediction.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

use super::models::{NetworkRisk, NodePrediction, RiskLevel, RiskLevelCounts};
use crate::network::features::GraphTensors;
use crate::network::models::unit_interval;
use crate::network::store::PortGraph;
use crate::propagation::{BackendVariant, PropagationBackend};

/// Runs the configured backend over a port graph and ranks the result.
#[derive(Clone)]
pub struct RiskPropagationEngine {
    backend: Arc<dyn PropagationBackend>,
}

impl RiskPropagationEngine {
    pub fn new(backend: Arc<dyn PropagationBackend>) -> Self {
        Self { backend }
    }

    pub fn variant(&self) -> BackendVariant {
        self.backend.variant()
    }

    /// Score every port in the graph.
    ///
    /// An empty graph yields [`NetworkRisk::empty`]. Predictions are sorted by
    /// descending score, ties broken by ascending port code.
    pub fn predict(&self, graph: &PortGraph) -> Result<NetworkRisk> {
        let variant = self.backend.variant();
        if graph.is_empty() {
            debug!("Empty port graph, returning zero-node result");
            return Ok(NetworkRisk::empty(variant));
        }

        let tensors = GraphTensors::from_graph(graph);
        debug!(
            "Forward pass: {} nodes, {} directed edges, backend {}",
            tensors.num_nodes(),
            tensors.num_edges(),
            variant
        );
        let output = self.backend.forward(&tensors)?;
        if output.node_risk.len() != graph.node_count() {
            bail!(
                "{} backend returned {} scores for {} ports",
                variant,
                output.node_risk.len(),
                graph.node_count()
            );
        }

        let mut level_counts = RiskLevelCounts::default();
        let mut predictions: Vec<NodePrediction> = graph
            .ports()
            .zip(&output.node_risk)
            .map(|(port, &risk_score)| {
                let risk_level = RiskLevel::from_score(risk_score);
                level_counts.record(risk_level);
                NodePrediction {
                    port_code: port.code.clone(),
                    risk_score,
                    risk_level,
                    congestion_input: unit_interval(port.congestion_level),
                    is_origin: port.is_origin,
                }
            })
            .collect();

        predictions.sort_by(|a, b| {
            b.risk_score
                .total_cmp(&a.risk_score)
                .then_with(|| a.port_code.cmp(&b.port_code))
        });

        Ok(NetworkRisk {
            predictions,
            graph_risk: output.graph_risk,
            level_counts,
            total_nodes: graph.node_count(),
            total_edges: graph.edge_count(),
            backend_variant: variant,
        })
    }
}
