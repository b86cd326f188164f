//! Risk result models.
//!
//! All scores in this module live in [0, 1]. Scaling to the 0–100 range
//! happens only in [`super::report`], at the output boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::propagation::BackendVariant;

// ============================================================================
// Risk levels
// ============================================================================

/// Discrete risk band for a node score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Scores strictly above this are at least `Medium`.
    pub const MEDIUM_ABOVE: f64 = 0.35;
    /// Scores strictly above this are at least `High`.
    pub const HIGH_ABOVE: f64 = 0.55;
    /// Scores strictly above this are `Critical`.
    pub const CRITICAL_ABOVE: f64 = 0.75;

    /// Classify a [0, 1] score.
    pub fn from_score(score: f64) -> Self {
        if score > Self::CRITICAL_ABOVE {
            Self::Critical
        } else if score > Self::HIGH_ABOVE {
            Self::High
        } else if score > Self::MEDIUM_ABOVE {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Number of nodes per risk level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLevelCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl RiskLevelCounts {
    pub fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
            RiskLevel::Critical => self.critical += 1,
        }
    }

    /// Nodes classified high or critical.
    pub fn elevated(&self) -> usize {
        self.high + self.critical
    }
}

// ============================================================================
// Network risk prediction
// ============================================================================

/// Risk prediction for a single port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePrediction {
    pub port_code: String,
    /// Propagated risk in [0, 1]
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// Normalized congestion that went into the forward pass
    pub congestion_input: f64,
    pub is_origin: bool,
}

/// Result of a network-wide forward pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRisk {
    /// Sorted by descending risk, ties by ascending port code
    pub predictions: Vec<NodePrediction>,
    /// Mean node risk in [0, 1]
    pub graph_risk: f64,
    pub level_counts: RiskLevelCounts,
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Backend that produced the scores
    pub backend_variant: BackendVariant,
}

impl NetworkRisk {
    /// Defined result for a snapshot with no ports.
    pub fn empty(backend_variant: BackendVariant) -> Self {
        Self {
            predictions: vec![],
            graph_risk: 0.0,
            level_counts: RiskLevelCounts::default(),
            total_nodes: 0,
            total_edges: 0,
            backend_variant,
        }
    }

    /// Scores keyed by port code.
    pub fn scores_by_code(&self) -> HashMap<&str, f64> {
        self.predictions
            .iter()
            .map(|p| (p.port_code.as_str(), p.risk_score))
            .collect()
    }
}

// ============================================================================
// Cascade simulation
// ============================================================================

/// Cascade outcome for a single port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeEntry {
    pub port_code: String,
    /// Risk added by the cascade, in [0, 1]
    pub cascade_risk_increase: f64,
    pub is_source: bool,
    pub original_congestion: f64,
    /// `min(1, original + increase × gain)`
    pub projected_congestion: f64,
}

/// Result of a cascade simulation from one source port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeResult {
    pub source_code: String,
    /// One entry per port in the graph, sorted by descending increase
    pub entries: Vec<CascadeEntry>,
    /// Maximum hop count reachable from the source (no cutoff)
    pub propagation_depth: usize,
    /// Sum of all increases; only meaningful relative to other simulations
    pub total_impact_score: f64,
}

impl CascadeResult {
    /// Ports whose increase is strictly above `threshold`.
    pub fn affected_ports(&self, threshold: f64) -> usize {
        self.entries
            .iter()
            .filter(|e| e.cascade_risk_increase > threshold)
            .count()
    }
}
