//! Cascade simulation.
//!
//! Breadth-first, hop-decayed spread of a failure from one source port over
//! the undirected route adjacency. The source carries an increase of 1.0;
//! every newly reached neighbour gets its parent's value times the hop decay.
//! A neighbour whose value is at or below the cutoff is recorded but does not
//! spread further. Each port is visited at most once, so a simulation is
//! O(N + E) time and O(N) memory.
//!
//! Reachability depth is a separate, unweighted BFS without cutoff.

use std::collections::VecDeque;

use tracing::debug;

use super::models::{CascadeEntry, CascadeResult};
use crate::error::{Result, RiskError};
use crate::network::models::unit_interval;
use crate::network::store::PortGraph;
use crate::CascadeSettings;

/// Cascade simulator with fixed decay parameters.
#[derive(Debug, Clone, Default)]
pub struct CascadeSimulator {
    settings: CascadeSettings,
}

impl CascadeSimulator {
    pub fn new(settings: CascadeSettings) -> Self {
        Self { settings }
    }

    /// Simulate a failure at `source_code`.
    pub fn simulate(&self, graph: &PortGraph, source_code: &str) -> Result<CascadeResult> {
        let source = graph
            .index_of(source_code)
            .ok_or_else(|| RiskError::unknown_port(source_code))?;

        let increases = self.decayed_spread(graph, source);
        let propagation_depth = reachability_depth(graph, source);

        let mut entries: Vec<CascadeEntry> = graph
            .ports()
            .zip(&increases)
            .enumerate()
            .map(|(idx, (port, &increase))| {
                let original = unit_interval(port.congestion_level);
                CascadeEntry {
                    port_code: port.code.clone(),
                    cascade_risk_increase: increase,
                    is_source: idx == source,
                    original_congestion: original,
                    projected_congestion: (original + increase * self.settings.congestion_gain)
                        .min(1.0),
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.cascade_risk_increase
                .total_cmp(&a.cascade_risk_increase)
                .then_with(|| a.port_code.cmp(&b.port_code))
        });

        let total_impact_score = increases.iter().sum();
        debug!(
            "Cascade from {}: {} ports reached, depth {}",
            source_code,
            increases.iter().filter(|v| **v > 0.0).count(),
            propagation_depth
        );

        Ok(CascadeResult {
            source_code: source_code.to_string(),
            entries,
            propagation_depth,
            total_impact_score,
        })
    }

    /// Per-node increase, in graph index order. Unreached nodes stay at 0.
    fn decayed_spread(&self, graph: &PortGraph, source: usize) -> Vec<f64> {
        let adjacency = graph.adjacency();
        let mut increase = vec![0.0; graph.node_count()];
        let mut visited = vec![false; graph.node_count()];
        let mut queue = VecDeque::new();

        increase[source] = 1.0;
        visited[source] = true;
        queue.push_back(source);

        while let Some(node) = queue.pop_front() {
            let next = increase[node] * self.settings.hop_decay;
            for &neighbor in &adjacency[node] {
                if visited[neighbor] {
                    continue;
                }
                visited[neighbor] = true;
                increase[neighbor] = next;
                if next > self.settings.propagation_cutoff {
                    queue.push_back(neighbor);
                }
            }
        }

        increase
    }
}

/// Largest hop count from `source` to any reachable port.
pub fn reachability_depth(graph: &PortGraph, source: usize) -> usize {
    let adjacency = graph.adjacency();
    let mut hops: Vec<Option<usize>> = vec![None; graph.node_count()];
    let mut queue = VecDeque::new();
    let mut deepest = 0;

    hops[source] = Some(0);
    queue.push_back(source);

    while let Some(node) = queue.pop_front() {
        let depth = hops[node].unwrap_or_default();
        deepest = deepest.max(depth);
        for &neighbor in &adjacency[node] {
            if hops[neighbor].is_none() {
                hops[neighbor] = Some(depth + 1);
                queue.push_back(neighbor);
            }
        }
    }

    deepest
}
