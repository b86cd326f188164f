//! Neighbour-averaging backend.
//!
//! Dependency-free fallback: starts from each port's congestion and, for a
//! fixed number of rounds, blends every node with the weighted mean of its
//! neighbours. Fair-weather routes couple ports strongly; storm-bound routes
//! (`weather_risk` near 1) barely couple them at all.

use anyhow::Result;

use super::{BackendOutput, BackendVariant, PropagationBackend};
use crate::network::features::{GraphTensors, CONGESTION, WEATHER_RISK};

/// Weight kept on a node's own value each round.
pub const SELF_WEIGHT: f64 = 0.6;
/// Weight given to the neighbour mean each round.
pub const NEIGHBOR_WEIGHT: f64 = 0.4;
/// Number of smoothing rounds.
pub const ROUNDS: usize = 3;

/// Plain-Rust graph averaging.
#[derive(Debug, Clone)]
pub struct AveragingBackend {
    rounds: usize,
}

impl AveragingBackend {
    pub fn new() -> Self {
        Self { rounds: ROUNDS }
    }
}

impl Default for AveragingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PropagationBackend for AveragingBackend {
    fn variant(&self) -> BackendVariant {
        BackendVariant::Averaging
    }

    fn forward(&self, input: &GraphTensors) -> Result<BackendOutput> {
        let n = input.num_nodes();

        // Incoming neighbours: (source, influence weight)
        let mut incoming: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for (&(src, dst), features) in input.edge_index.iter().zip(&input.edge_features) {
            if src < n && dst < n {
                let weight = 1.0 - f64::from(features[WEATHER_RISK]);
                incoming[dst].push((src, weight));
            }
        }

        let mut risk: Vec<f64> = input
            .node_features
            .iter()
            .map(|f| f64::from(f[CONGESTION]))
            .collect();

        for _ in 0..self.rounds {
            let next: Vec<f64> = (0..n)
                .map(|node| {
                    let (weighted, total) = incoming[node]
                        .iter()
                        .fold((0.0, 0.0), |(acc, tot), &(src, w)| (acc + risk[src] * w, tot + w));
                    let value = if total > 0.0 {
                        SELF_WEIGHT * risk[node] + NEIGHBOR_WEIGHT * (weighted / total)
                    } else {
                        risk[node]
                    };
                    value.clamp(0.0, 1.0)
                })
                .collect();
            risk = next;
        }

        Ok(BackendOutput::from_node_risk(risk))
    }
}
