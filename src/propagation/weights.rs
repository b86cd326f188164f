//! Weight set shared by the tensor backends.
//!
//! Weights come either from a safetensors checkpoint or from a deterministic
//! seeded generator (an untrained, congestion-anchored prior). Training is an
//! offline concern; this module only loads.
//!
//! Tensor names:
//!
//! | name                          | shape    | constraint          |
//! |-------------------------------|----------|---------------------|
//! | `node_encoder.weight`         | [64, 6]  | column 0 >= 0       |
//! | `node_encoder.bias`           | [64]     |                     |
//! | `edge_encoder.weight`         | [64, 4]  | attention only      |
//! | `edge_encoder.bias`           | [64]     | attention only      |
//! | `layers.{l}.update.weight`    | [64, 64] | >= 0                |
//! | `layers.{l}.update.bias`      | [64]     |                     |
//! | `layers.{l}.message.weight`   | [64, 64] | >= 0, attention only|
//! | `layers.{l}.attention.weight` | [64, 4]  | attention only      |
//! | `risk_head.0.weight`          | [32, 64] | >= 0                |
//! | `risk_head.0.bias`            | [32]     |                     |
//! | `risk_head.1.weight`          | [1, 32]  | >= 0                |
//! | `risk_head.1.bias`            | [1]      |                     |
//!
//! Non-negative weights on every path from the congestion feature to the
//! score keep each node's score monotone in its own congestion. Loaded
//! weights are projected with `abs` to enforce it.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::network::features::{CONGESTION, EDGE_FEATURES, NODE_FEATURES};

pub const HIDDEN_DIM: usize = 64;
pub const NUM_HEADS: usize = 4;
pub const HEAD_DIM: usize = HIDDEN_DIM / NUM_HEADS;
pub const NUM_LAYERS: usize = 3;
pub const SCORE_HIDDEN: usize = HIDDEN_DIM / 2;

/// Seeded prior: congestion column drawn from this range.
const ENCODER_CONGESTION_RANGE: (f32, f32) = (0.5, 1.0);
/// Seeded prior: gain and offset of the output unit, centring scores near
/// mid-range congestion.
const HEAD_GAIN: f32 = 6.0;
const HEAD_OFFSET: f32 = -2.25;

// ============================================================================
// Layers
// ============================================================================

/// One message-passing layer.
#[derive(Debug, Clone)]
pub struct PropagationLayer {
    /// Self update, `[HIDDEN, HIDDEN]` with bias
    pub update: Linear,
    /// Neighbour message projection, no bias
    pub message: Option<Linear>,
    /// Per-head attention vectors over edge embeddings, `[HIDDEN, HEADS]`
    pub attention: Option<Tensor>,
}

/// Encoder, message-passing layers and scoring head.
#[derive(Debug, Clone)]
pub struct PropagationWeights {
    pub node_encoder: Linear,
    pub edge_encoder: Option<Linear>,
    pub layers: Vec<PropagationLayer>,
    pub risk_hidden: Linear,
    pub risk_out: Linear,
    device: Device,
}

impl PropagationWeights {
    /// Deterministic weights for `seed`.
    pub fn seeded(seed: u64) -> Result<Self> {
        let device = Device::Cpu;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut map = HashMap::new();

        // Node encoder: Xavier-uniform, congestion column positive
        let limit = xavier_limit(NODE_FEATURES, HIDDEN_DIM);
        let mut encoder = uniform(&mut rng, HIDDEN_DIM * NODE_FEATURES, -limit, limit);
        for row in 0..HIDDEN_DIM {
            let (lo, hi) = ENCODER_CONGESTION_RANGE;
            encoder[row * NODE_FEATURES + CONGESTION] = rng.gen_range(lo..hi);
        }
        map.insert(
            "node_encoder.weight".to_string(),
            Tensor::from_vec(encoder, (HIDDEN_DIM, NODE_FEATURES), &device)?,
        );
        map.insert("node_encoder.bias".to_string(), Tensor::zeros(HIDDEN_DIM, DType::F32, &device)?);

        let limit = xavier_limit(EDGE_FEATURES, HIDDEN_DIM);
        map.insert(
            "edge_encoder.weight".to_string(),
            Tensor::from_vec(
                uniform(&mut rng, HIDDEN_DIM * EDGE_FEATURES, -limit, limit),
                (HIDDEN_DIM, EDGE_FEATURES),
                &device,
            )?,
        );
        map.insert("edge_encoder.bias".to_string(), Tensor::zeros(HIDDEN_DIM, DType::F32, &device)?);

        // Self and message paths each carry about half the signal; every node
        // receives at least its own message, so together they keep its scale
        let mix = 1.0 / HIDDEN_DIM as f32;
        let att_limit = xavier_limit(HIDDEN_DIM, NUM_HEADS);
        for l in 0..NUM_LAYERS {
            map.insert(
                format!("layers.{l}.update.weight"),
                Tensor::from_vec(uniform(&mut rng, HIDDEN_DIM * HIDDEN_DIM, 0.0, mix), (HIDDEN_DIM, HIDDEN_DIM), &device)?,
            );
            map.insert(format!("layers.{l}.update.bias"), Tensor::zeros(HIDDEN_DIM, DType::F32, &device)?);
            map.insert(
                format!("layers.{l}.message.weight"),
                Tensor::from_vec(uniform(&mut rng, HIDDEN_DIM * HIDDEN_DIM, 0.0, mix), (HIDDEN_DIM, HIDDEN_DIM), &device)?,
            );
            map.insert(
                format!("layers.{l}.attention.weight"),
                Tensor::from_vec(
                    uniform(&mut rng, HIDDEN_DIM * NUM_HEADS, -att_limit, att_limit),
                    (HIDDEN_DIM, NUM_HEADS),
                    &device,
                )?,
            );
        }

        let hidden_scale = 2.0 / HIDDEN_DIM as f32;
        map.insert(
            "risk_head.0.weight".to_string(),
            Tensor::from_vec(uniform(&mut rng, SCORE_HIDDEN * HIDDEN_DIM, 0.0, hidden_scale), (SCORE_HIDDEN, HIDDEN_DIM), &device)?,
        );
        map.insert("risk_head.0.bias".to_string(), Tensor::zeros(SCORE_HIDDEN, DType::F32, &device)?);
        let out_scale = 2.0 * HEAD_GAIN / SCORE_HIDDEN as f32;
        map.insert(
            "risk_head.1.weight".to_string(),
            Tensor::from_vec(uniform(&mut rng, SCORE_HIDDEN, 0.0, out_scale), (1, SCORE_HIDDEN), &device)?,
        );
        map.insert("risk_head.1.bias".to_string(), Tensor::new(&[HEAD_OFFSET], &device)?);

        Self::from_tensor_map(map, device)
    }

    /// Load a safetensors checkpoint.
    ///
    /// Attention tensors are optional; a checkpoint without them can still
    /// drive the edge-blind backend.
    pub fn from_safetensors(path: &Path) -> Result<Self> {
        let device = Device::Cpu;
        let map = candle_core::safetensors::load(path, &device)
            .with_context(|| format!("failed to read weights from {}", path.display()))?;
        debug!("Loaded {} tensors from {}", map.len(), path.display());
        Self::from_tensor_map(map, device)
    }

    fn from_tensor_map(mut map: HashMap<String, Tensor>, device: Device) -> Result<Self> {
        let encoder_weight = take(&mut map, "node_encoder.weight", &[HIDDEN_DIM, NODE_FEATURES])?;
        let node_encoder = Linear::new(
            non_negative_column(&encoder_weight, CONGESTION)?,
            Some(take(&mut map, "node_encoder.bias", &[HIDDEN_DIM])?),
        );

        let edge_encoder = match (
            take_optional(&mut map, "edge_encoder.weight", &[HIDDEN_DIM, EDGE_FEATURES])?,
            take_optional(&mut map, "edge_encoder.bias", &[HIDDEN_DIM])?,
        ) {
            (Some(w), Some(b)) => Some(Linear::new(w, Some(b))),
            _ => None,
        };

        let mut layers = Vec::with_capacity(NUM_LAYERS);
        for l in 0..NUM_LAYERS {
            let update = Linear::new(
                take(&mut map, &format!("layers.{l}.update.weight"), &[HIDDEN_DIM, HIDDEN_DIM])?.abs()?,
                Some(take(&mut map, &format!("layers.{l}.update.bias"), &[HIDDEN_DIM])?),
            );
            let message = take_optional(&mut map, &format!("layers.{l}.message.weight"), &[HIDDEN_DIM, HIDDEN_DIM])?
                .map(|w| w.abs())
                .transpose()?
                .map(|w| Linear::new(w, None));
            let attention = take_optional(&mut map, &format!("layers.{l}.attention.weight"), &[HIDDEN_DIM, NUM_HEADS])?;
            layers.push(PropagationLayer {
                update,
                message,
                attention,
            });
        }

        let risk_hidden = Linear::new(
            take(&mut map, "risk_head.0.weight", &[SCORE_HIDDEN, HIDDEN_DIM])?.abs()?,
            Some(take(&mut map, "risk_head.0.bias", &[SCORE_HIDDEN])?),
        );
        let risk_out = Linear::new(
            take(&mut map, "risk_head.1.weight", &[1, SCORE_HIDDEN])?.abs()?,
            Some(take(&mut map, "risk_head.1.bias", &[1])?),
        );

        Ok(Self {
            node_encoder,
            edge_encoder,
            layers,
            risk_hidden,
            risk_out,
            device,
        })
    }

    /// Whether every tensor needed for attention message passing is present.
    pub fn has_attention(&self) -> bool {
        self.edge_encoder.is_some()
            && self
                .layers
                .iter()
                .all(|l| l.message.is_some() && l.attention.is_some())
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Project `[N, 6]` node features into `[N, HIDDEN]` embeddings.
    pub fn encode_nodes(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.node_encoder.forward(x)?)
    }

    /// Score `[N, HIDDEN]` embeddings into `[N]` risks in (0, 1).
    pub fn score(&self, h: &Tensor) -> Result<Tensor> {
        let hidden = self.risk_hidden.forward(h)?.relu()?;
        let logits = self.risk_out.forward(&hidden)?;
        Ok(candle_nn::ops::sigmoid(&logits)?.squeeze(1)?)
    }

    /// All tensors under their checkpoint names.
    pub fn to_tensor_map(&self) -> HashMap<String, Tensor> {
        let mut map = HashMap::new();
        insert_linear(&mut map, "node_encoder", &self.node_encoder);
        if let Some(edge) = &self.edge_encoder {
            insert_linear(&mut map, "edge_encoder", edge);
        }
        for (l, layer) in self.layers.iter().enumerate() {
            insert_linear(&mut map, &format!("layers.{l}.update"), &layer.update);
            if let Some(message) = &layer.message {
                map.insert(format!("layers.{l}.message.weight"), message.weight().clone());
            }
            if let Some(attention) = &layer.attention {
                map.insert(format!("layers.{l}.attention.weight"), attention.clone());
            }
        }
        insert_linear(&mut map, "risk_head.0", &self.risk_hidden);
        insert_linear(&mut map, "risk_head.1", &self.risk_out);
        map
    }

    /// Write the weight set as a safetensors checkpoint.
    pub fn save_safetensors(&self, path: &Path) -> Result<()> {
        candle_core::safetensors::save(&self.to_tensor_map(), path)
            .with_context(|| format!("failed to write weights to {}", path.display()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn xavier_limit(fan_in: usize, fan_out: usize) -> f32 {
    (6.0 / (fan_in + fan_out) as f32).sqrt()
}

fn uniform(rng: &mut StdRng, len: usize, lo: f32, hi: f32) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(lo..hi)).collect()
}

fn take(map: &mut HashMap<String, Tensor>, name: &str, shape: &[usize]) -> Result<Tensor> {
    match take_optional(map, name, shape)? {
        Some(t) => Ok(t),
        None => bail!("missing tensor {name}"),
    }
}

fn take_optional(
    map: &mut HashMap<String, Tensor>,
    name: &str,
    shape: &[usize],
) -> Result<Option<Tensor>> {
    let Some(tensor) = map.remove(name) else {
        return Ok(None);
    };
    if tensor.dims() != shape {
        bail!(
            "tensor {name} has shape {:?}, expected {:?}",
            tensor.dims(),
            shape
        );
    }
    Ok(Some(tensor.to_dtype(DType::F32)?))
}

/// Replace column `col` of a 2-D tensor with its absolute value.
fn non_negative_column(weight: &Tensor, col: usize) -> Result<Tensor> {
    let cols = weight.dim(1)?;
    let mut parts = Vec::with_capacity(3);
    if col > 0 {
        parts.push(weight.narrow(1, 0, col)?);
    }
    parts.push(weight.narrow(1, col, 1)?.abs()?);
    if col + 1 < cols {
        parts.push(weight.narrow(1, col + 1, cols - col - 1)?);
    }
    Ok(Tensor::cat(&parts, 1)?)
}

fn insert_linear(map: &mut HashMap<String, Tensor>, prefix: &str, linear: &Linear) {
    map.insert(format!("{prefix}.weight"), linear.weight().clone());
    if let Some(bias) = linear.bias() {
        map.insert(format!("{prefix}.bias"), bias.clone());
    }
}
