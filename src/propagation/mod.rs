//! Risk propagation backends.
//!
//! A backend maps normalized graph tensors to a risk score in [0, 1] per node
//! plus a graph-level aggregate. Three interchangeable variants exist:
//!
//! | variant      | message passing | neighbours | requires |
//! |--------------|-----------------|------------|----------|
//! | `attention`  | 3 layers, 4 heads, edge-feature attention | yes | weights with attention tensors |
//! | `edge_blind` | self-update only | no        | encoder + head weights |
//! | `averaging`  | weighted neighbour mean | yes | nothing |
//!
//! ## Selection
//!
//! With `backend: auto` the service tries the variants in the order above and
//! keeps the first that initializes. Naming a variant explicitly makes a
//! failure to initialize fatal instead.
//!
//! ## Modules
//!
//! - [`weights`]: Seeded or checkpoint-loaded tensor weights
//! - [`attention`]: Attention message passing (candle)
//! - [`edge_blind`]: Per-node scoring without messages (candle)
//! - [`averaging`]: Plain-Rust neighbour averaging

pub mod attention;
pub mod averaging;
pub mod edge_blind;
pub mod weights;

pub use attention::AttentionBackend;
pub use averaging::AveragingBackend;
pub use edge_blind::EdgeBlindBackend;
pub use weights::PropagationWeights;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RiskError;
use crate::network::features::GraphTensors;
use crate::network::models::unit_interval;
use crate::ModelConfig;

// ============================================================================
// Backend trait
// ============================================================================

/// A risk propagation model.
///
/// Implementations are stateless after construction and safe to share across
/// threads. `forward` must return exactly one score per node, each in [0, 1].
pub trait PropagationBackend: Send + Sync {
    fn variant(&self) -> BackendVariant;

    fn forward(&self, input: &GraphTensors) -> Result<BackendOutput>;
}

/// Scores produced by a forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOutput {
    /// One score per node, in graph index order
    pub node_risk: Vec<f64>,
    /// Mean of `node_risk`, 0 for an empty graph
    pub graph_risk: f64,
}

impl BackendOutput {
    /// Bound every score to [0, 1] and derive the graph aggregate.
    pub fn from_node_risk(node_risk: Vec<f64>) -> Self {
        let node_risk: Vec<f64> = node_risk.into_iter().map(unit_interval).collect();
        let graph_risk = if node_risk.is_empty() {
            0.0
        } else {
            node_risk.iter().sum::<f64>() / node_risk.len() as f64
        };
        Self {
            node_risk,
            graph_risk,
        }
    }
}

// ============================================================================
// Variants
// ============================================================================

/// Which backend produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendVariant {
    Attention,
    EdgeBlind,
    Averaging,
}

impl BackendVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attention => "attention",
            Self::EdgeBlind => "edge_blind",
            Self::Averaging => "averaging",
        }
    }

    pub fn model_version(self) -> &'static str {
        match self {
            Self::Attention => "1.0.0-gat",
            Self::EdgeBlind => "1.0.0-mlp",
            Self::Averaging => "1.0.0-averaging",
        }
    }

    /// Human-readable architecture summary.
    pub fn architecture(self) -> String {
        match self {
            Self::Attention => format!(
                "graph attention: {} layers, {} heads, hidden {}",
                weights::NUM_LAYERS,
                weights::NUM_HEADS,
                weights::HIDDEN_DIM
            ),
            Self::EdgeBlind => format!(
                "per-node feed-forward: {} layers, hidden {}, no neighbour messages",
                weights::NUM_LAYERS,
                weights::HIDDEN_DIM
            ),
            Self::Averaging => format!(
                "neighbour averaging: {} rounds, self weight {}",
                averaging::ROUNDS,
                averaging::SELF_WEIGHT
            ),
        }
    }

    /// Whether a node's score can depend on its neighbours.
    pub fn is_network_aware(self) -> bool {
        !matches!(self, Self::EdgeBlind)
    }
}

impl std::fmt::Display for BackendVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured backend choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    #[default]
    Auto,
    Attention,
    EdgeBlind,
    Averaging,
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(Self::Auto),
            "attention" | "gat" => Ok(Self::Attention),
            "edge_blind" | "mlp" => Ok(Self::EdgeBlind),
            "averaging" | "numpy" => Ok(Self::Averaging),
            other => Err(format!(
                "unknown backend '{other}' (expected auto, attention, edge_blind or averaging)"
            )),
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

fn load_weights(config: &ModelConfig) -> Result<PropagationWeights> {
    match &config.weights_path {
        Some(path) => PropagationWeights::from_safetensors(path),
        None => PropagationWeights::seeded(config.seed),
    }
}

fn build_variant(
    variant: BackendVariant,
    config: &ModelConfig,
) -> Result<Arc<dyn PropagationBackend>> {
    let backend: Arc<dyn PropagationBackend> = match variant {
        BackendVariant::Attention => Arc::new(AttentionBackend::new(load_weights(config)?)?),
        BackendVariant::EdgeBlind => Arc::new(EdgeBlindBackend::new(load_weights(config)?)),
        BackendVariant::Averaging => Arc::new(AveragingBackend::new()),
    };
    Ok(backend)
}

/// Build the configured backend.
///
/// `auto` degrades attention → edge_blind → averaging, logging each failure.
/// An explicit choice that cannot initialize is returned as
/// [`RiskError::BackendUnavailable`].
pub fn select_backend(
    config: &ModelConfig,
) -> std::result::Result<Arc<dyn PropagationBackend>, RiskError> {
    let explicit = match config.backend {
        BackendPreference::Auto => None,
        BackendPreference::Attention => Some(BackendVariant::Attention),
        BackendPreference::EdgeBlind => Some(BackendVariant::EdgeBlind),
        BackendPreference::Averaging => Some(BackendVariant::Averaging),
    };

    if let Some(variant) = explicit {
        let backend = build_variant(variant, config).map_err(|e| {
            RiskError::backend_unavailable(format!("{variant} backend failed to initialize: {e:#}"))
        })?;
        info!("Propagation backend: {} ({})", variant, variant.model_version());
        return Ok(backend);
    }

    for variant in [
        BackendVariant::Attention,
        BackendVariant::EdgeBlind,
        BackendVariant::Averaging,
    ] {
        match build_variant(variant, config) {
            Ok(backend) => {
                info!("Propagation backend: {} ({})", variant, variant.model_version());
                return Ok(backend);
            }
            Err(e) => warn!("{} backend unavailable, trying next: {:#}", variant, e),
        }
    }

    Err(RiskError::backend_unavailable(
        "no propagation backend could be initialized",
    ))
}
