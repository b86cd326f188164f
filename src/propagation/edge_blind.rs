//! Edge-blind backend.
//!
//! Runs the same encoder, update layers and scoring head as the attention
//! backend with attention collapsed onto each node's self-loop: the only
//! message a node receives is its own, so it is scored from its own features
//! alone. Useful as a baseline and as the fallback when a checkpoint carries
//! no attention tensors; layers without a message projection use the self
//! update only.

use anyhow::Result;
use candle_core::Tensor;
use candle_nn::Module;

use super::weights::PropagationWeights;
use super::{BackendOutput, BackendVariant, PropagationBackend};
use crate::network::features::{GraphTensors, NODE_FEATURES};

#[derive(Debug, Clone)]
pub struct EdgeBlindBackend {
    weights: PropagationWeights,
}

impl EdgeBlindBackend {
    pub fn new(weights: PropagationWeights) -> Self {
        Self { weights }
    }
}

impl PropagationBackend for EdgeBlindBackend {
    fn variant(&self) -> BackendVariant {
        BackendVariant::EdgeBlind
    }

    fn forward(&self, input: &GraphTensors) -> Result<BackendOutput> {
        let n = input.num_nodes();
        if n == 0 {
            return Ok(BackendOutput::from_node_risk(vec![]));
        }

        let x = Tensor::from_vec(
            input.flat_node_features(),
            (n, NODE_FEATURES),
            self.weights.device(),
        )?;
        let mut h = self.weights.encode_nodes(&x)?;
        for layer in &self.weights.layers {
            let updated = layer.update.forward(&h)?;
            h = match &layer.message {
                Some(message) => updated.add(&message.forward(&h)?)?.relu()?,
                None => updated.relu()?,
            };
        }

        let scores: Vec<f32> = self.weights.score(&h)?.to_vec1()?;
        Ok(BackendOutput::from_node_risk(
            scores.into_iter().map(f64::from).collect(),
        ))
    }
}
