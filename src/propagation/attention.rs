//! Attention message-passing backend.
//!
//! Each layer updates every node from its own embedding plus an
//! attention-weighted sum of neighbour messages:
//!
//! ```text
//! h' = relu(W_self·h + b + concat_k Σ_{j→i} α_k(j,i) · (W_msg·h_j)_k)
//! α_k(·,i) = softmax over incoming edges of leaky_relu(a_kᵀ · e_ji)
//! ```
//!
//! Every node also receives a self-loop carrying a neutral route (all route
//! features zero), so the incoming set is never empty and a port without
//! routes keeps the full strength of its own signal.
//!
//! Attention logits depend on the encoded route features only, so a route in
//! a storm or with long delays gets a different share of the target's
//! attention than a fair-weather one. The non-negative weight constraints
//! from [`super::weights`] keep scores monotone in congestion.

use anyhow::{bail, Result};
use candle_core::{DType, Tensor};
use candle_nn::Module;

use super::weights::{PropagationLayer, PropagationWeights, HEAD_DIM, HIDDEN_DIM, NUM_HEADS};
use super::{BackendOutput, BackendVariant, PropagationBackend};
use crate::network::features::{GraphTensors, EDGE_FEATURES, NODE_FEATURES};

const LEAKY_SLOPE: f64 = 0.2;
const SOFTMAX_EPS: f64 = 1e-12;

/// Graph attention backend.
#[derive(Debug, Clone)]
pub struct AttentionBackend {
    weights: PropagationWeights,
}

impl AttentionBackend {
    /// Fails when the weight set lacks any attention tensor.
    pub fn new(weights: PropagationWeights) -> Result<Self> {
        if !weights.has_attention() {
            bail!("weights do not contain attention tensors");
        }
        Ok(Self { weights })
    }
}

/// Edge tensors shared by every layer of one forward pass, self-loops
/// appended after the routes.
struct EdgeInputs {
    src: Tensor,
    dst: Tensor,
    embedding: Tensor,
    count: usize,
}

impl AttentionBackend {
    fn edge_inputs(&self, input: &GraphTensors) -> Result<EdgeInputs> {
        let Some(encoder) = &self.weights.edge_encoder else {
            bail!("edge encoder missing");
        };
        let routes = input.num_edges();
        let nodes = input.num_nodes();
        let count = routes + nodes;
        let device = self.weights.device();

        let (src, dst): (Vec<u32>, Vec<u32>) = input
            .edge_index
            .iter()
            .map(|&(s, d)| (s as u32, d as u32))
            .chain((0..nodes as u32).map(|n| (n, n)))
            .unzip();
        let mut attrs = input.flat_edge_features();
        attrs.resize(count * EDGE_FEATURES, 0.0);
        let attrs = Tensor::from_vec(attrs, (count, EDGE_FEATURES), device)?;

        Ok(EdgeInputs {
            src: Tensor::from_vec(src, count, device)?,
            dst: Tensor::from_vec(dst, count, device)?,
            embedding: encoder.forward(&attrs)?,
            count,
        })
    }

    /// Per-head attention coefficients, `[E, HEADS]`, summing to 1 over the
    /// incoming edges of each target.
    fn attention(attention: &Tensor, edges: &EdgeInputs, num_nodes: usize) -> Result<Tensor> {
        let raw = edges.embedding.matmul(attention)?;
        let logits = raw.maximum(&raw.affine(LEAKY_SLOPE, 0.0)?)?;

        // Segment softmax by target node
        let max = logits.max_keepdim(0)?;
        let exp = logits.broadcast_sub(&max)?.exp()?;
        let denom = Tensor::zeros((num_nodes, NUM_HEADS), DType::F32, logits.device())?
            .index_add(&edges.dst, &exp, 0)?
            .affine(1.0, SOFTMAX_EPS)?;
        Ok(exp.div(&denom.index_select(&edges.dst, 0)?)?)
    }

    fn layer_forward(layer: &PropagationLayer, h: &Tensor, edges: &EdgeInputs) -> Result<Tensor> {
        let (Some(message), Some(attention)) = (&layer.message, &layer.attention) else {
            bail!("layer is missing attention tensors");
        };
        let updated = layer.update.forward(h)?;

        let num_nodes = h.dim(0)?;
        let alpha = Self::attention(attention, edges, num_nodes)?;
        let messages = message
            .forward(h)?
            .index_select(&edges.src, 0)?
            .reshape((edges.count, NUM_HEADS, HEAD_DIM))?
            .broadcast_mul(&alpha.unsqueeze(2)?)?;
        let aggregated = Tensor::zeros((num_nodes, NUM_HEADS, HEAD_DIM), DType::F32, h.device())?
            .index_add(&edges.dst, &messages, 0)?
            .reshape((num_nodes, HIDDEN_DIM))?;
        Ok(updated.add(&aggregated)?.relu()?)
    }
}

impl PropagationBackend for AttentionBackend {
    fn variant(&self) -> BackendVariant {
        BackendVariant::Attention
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
        let edges = self.edge_inputs(input)?;

        let mut h = self.weights.encode_nodes(&x)?;
        for layer in &self.weights.layers {
            h = Self::layer_forward(layer, &h, &edges)?;
        }

        let scores: Vec<f32> = self.weights.score(&h)?.to_vec1()?;
        Ok(BackendOutput::from_node_risk(
            scores.into_iter().map(f64::from).collect(),
        ))
    }
}
