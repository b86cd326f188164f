//! Output payloads.
//!
//! The only place where [0, 1] scores become 0–100 percentages. Values are
//! scaled, never rounded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{CascadeResult, NetworkRisk, RiskLevel, RiskLevelCounts};
use crate::network::features::{EDGE_FEATURE_NAMES, NODE_FEATURE_NAMES};
use crate::network::models::unit_interval;
use crate::propagation::{weights, BackendVariant};

/// Cascade increases above this many points count as an affected port.
pub const AFFECTED_THRESHOLD: f64 = 10.0;
/// Network effects beyond this many points count as an increase or decrease.
pub const EFFECT_DIRECTION_THRESHOLD: f64 = 5.0;
/// Network effects beyond this many points count as significant.
pub const SIGNIFICANT_EFFECT_THRESHOLD: f64 = 10.0;

fn percent(score: f64) -> f64 {
    score * 100.0
}

// ============================================================================
// Network risk
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePredictionReport {
    pub port_code: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub congestion_input: f64,
    pub is_origin: bool,
}

/// Network-wide prediction payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRiskReport {
    pub timestamp: DateTime<Utc>,
    pub network_risk_score: f64,
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Ports classified high or critical
    pub high_risk_nodes: usize,
    pub node_predictions: Vec<NodePredictionReport>,
    pub backend_variant: BackendVariant,
    pub model_version: String,
    pub level_counts: RiskLevelCounts,
}

impl NetworkRiskReport {
    pub fn new(risk: &NetworkRisk, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            network_risk_score: percent(risk.graph_risk),
            total_nodes: risk.total_nodes,
            total_edges: risk.total_edges,
            high_risk_nodes: risk.level_counts.elevated(),
            node_predictions: risk
                .predictions
                .iter()
                .map(|p| NodePredictionReport {
                    port_code: p.port_code.clone(),
                    risk_score: percent(p.risk_score),
                    risk_level: p.risk_level,
                    congestion_input: percent(p.congestion_input),
                    is_origin: p.is_origin,
                })
                .collect(),
            backend_variant: risk.backend_variant,
            model_version: risk.backend_variant.model_version().to_string(),
            level_counts: risk.level_counts,
        }
    }
}

// ============================================================================
// Cascade
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeEntryReport {
    pub port_code: String,
    pub cascade_risk_increase: f64,
    pub is_source: bool,
    pub original_congestion: f64,
    pub projected_congestion: f64,
}

/// Cascade simulation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub timestamp: DateTime<Utc>,
    pub source_port: String,
    pub cascade_simulation: Vec<CascadeEntryReport>,
    pub total_impact_score: f64,
    /// Ports whose increase exceeds [`AFFECTED_THRESHOLD`] points
    pub affected_ports: usize,
    pub propagation_depth: usize,
}

impl CascadeReport {
    pub fn new(result: &CascadeResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            source_port: result.source_code.clone(),
            cascade_simulation: result
                .entries
                .iter()
                .map(|e| CascadeEntryReport {
                    port_code: e.port_code.clone(),
                    cascade_risk_increase: percent(e.cascade_risk_increase),
                    is_source: e.is_source,
                    original_congestion: percent(e.original_congestion),
                    projected_congestion: percent(e.projected_congestion),
                })
                .collect(),
            total_impact_score: percent(result.total_impact_score),
            affected_ports: result.affected_ports(AFFECTED_THRESHOLD / 100.0),
            propagation_depth: result.propagation_depth,
        }
    }
}

// ============================================================================
// Baseline comparison
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectDirection {
    Increase,
    Decrease,
    Similar,
}

impl EffectDirection {
    pub fn from_effect(effect: f64) -> Self {
        if effect > EFFECT_DIRECTION_THRESHOLD {
            Self::Increase
        } else if effect < -EFFECT_DIRECTION_THRESHOLD {
            Self::Decrease
        } else {
            Self::Similar
        }
    }
}

/// Propagated risk against the congestion-only baseline for one port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortComparison {
    pub port_code: String,
    /// Congestion × 100
    pub baseline_risk: f64,
    pub propagated_risk: f64,
    /// `propagated_risk - baseline_risk`
    pub network_effect: f64,
    pub network_effect_direction: EffectDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub avg_baseline_risk: f64,
    pub avg_propagated_risk: f64,
    /// Largest signed network effect
    pub max_network_effect: f64,
    pub ports_with_significant_network_effects: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub timestamp: DateTime<Utc>,
    /// Sorted by descending absolute network effect
    pub comparison: Vec<PortComparison>,
    pub summary: ComparisonSummary,
    pub backend_variant: BackendVariant,
}

impl BaselineComparison {
    /// Compare each `(port_code, congestion)` baseline against the propagated
    /// scores. Congestion is bounded to [0, 1]; ports missing from `risk`
    /// count as 0.
    pub fn new<'a>(
        baselines: impl IntoIterator<Item = (&'a str, f64)>,
        risk: &NetworkRisk,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let scores = risk.scores_by_code();
        let mut comparison: Vec<PortComparison> = baselines
            .into_iter()
            .map(|(port_code, congestion)| {
                let baseline_risk = percent(unit_interval(congestion));
                let propagated_risk = percent(scores.get(port_code).copied().unwrap_or(0.0));
                let network_effect = propagated_risk - baseline_risk;
                PortComparison {
                    port_code: port_code.to_string(),
                    baseline_risk,
                    propagated_risk,
                    network_effect,
                    network_effect_direction: EffectDirection::from_effect(network_effect),
                }
            })
            .collect();

        comparison.sort_by(|a, b| {
            b.network_effect
                .abs()
                .total_cmp(&a.network_effect.abs())
                .then_with(|| a.port_code.cmp(&b.port_code))
        });

        let summary = if comparison.is_empty() {
            ComparisonSummary::default()
        } else {
            let n = comparison.len() as f64;
            ComparisonSummary {
                avg_baseline_risk: comparison.iter().map(|c| c.baseline_risk).sum::<f64>() / n,
                avg_propagated_risk: comparison.iter().map(|c| c.propagated_risk).sum::<f64>() / n,
                max_network_effect: comparison
                    .iter()
                    .map(|c| c.network_effect)
                    .fold(f64::NEG_INFINITY, f64::max),
                ports_with_significant_network_effects: comparison
                    .iter()
                    .filter(|c| c.network_effect.abs() > SIGNIFICANT_EFFECT_THRESHOLD)
                    .count(),
            }
        };

        Self {
            timestamp,
            comparison,
            summary,
            backend_variant: risk.backend_variant,
        }
    }
}

// ============================================================================
// Model info
// ============================================================================

/// Static description of the active backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub backend_variant: BackendVariant,
    pub model_version: String,
    pub architecture: String,
    pub network_aware: bool,
    pub layers: usize,
    pub hidden_dim: usize,
    pub attention_heads: usize,
    pub node_features: Vec<String>,
    pub edge_features: Vec<String>,
    pub capabilities: Vec<String>,
}

impl ModelInfo {
    pub fn new(variant: BackendVariant) -> Self {
        Self {
            model_name: "PortRiskPropagation".to_string(),
            backend_variant: variant,
            model_version: variant.model_version().to_string(),
            architecture: variant.architecture(),
            network_aware: variant.is_network_aware(),
            layers: weights::NUM_LAYERS,
            hidden_dim: weights::HIDDEN_DIM,
            attention_heads: weights::NUM_HEADS,
            node_features: NODE_FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            edge_features: EDGE_FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            capabilities: vec![
                "Network-wide risk prediction".to_string(),
                "Cascading failure simulation".to_string(),
                "Graph visualization data".to_string(),
                "Comparison with congestion baseline".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::models::{CascadeEntry, NodePrediction};

    fn prediction(code: &str, score: f64) -> NodePrediction {
        NodePrediction {
            port_code: code.to_string(),
            risk_score: score,
            risk_level: RiskLevel::from_score(score),
            congestion_input: 0.5,
            is_origin: false,
        }
    }

    fn network_risk(predictions: Vec<NodePrediction>) -> NetworkRisk {
        let mut level_counts = RiskLevelCounts::default();
        for p in &predictions {
            level_counts.record(p.risk_level);
        }
        let graph_risk =
            predictions.iter().map(|p| p.risk_score).sum::<f64>() / predictions.len() as f64;
        NetworkRisk {
            total_nodes: predictions.len(),
            total_edges: 0,
            predictions,
            graph_risk,
            level_counts,
            backend_variant: BackendVariant::Averaging,
        }
    }

    #[test]
    fn test_network_report_scales_to_percent() {
        let risk = network_risk(vec![prediction("A", 0.8), prediction("B", 0.2)]);
        let report = NetworkRiskReport::new(&risk, Utc::now());
        assert!((report.network_risk_score - 50.0).abs() < 1e-9);
        assert!((report.node_predictions[0].risk_score - 80.0).abs() < 1e-9);
        assert_eq!(report.node_predictions[0].congestion_input, 50.0);
        assert_eq!(report.high_risk_nodes, 1);
        assert_eq!(report.model_version, "1.0.0-averaging");
    }

    #[test]
    fn test_cascade_report_keeps_precision() {
        let result = CascadeResult {
            source_code: "A".into(),
            entries: vec![
                CascadeEntry {
                    port_code: "A".into(),
                    cascade_risk_increase: 1.0,
                    is_source: true,
                    original_congestion: 0.5,
                    projected_congestion: 0.8,
                },
                CascadeEntry {
                    port_code: "C".into(),
                    cascade_risk_increase: 0.4225,
                    is_source: false,
                    original_congestion: 0.1,
                    projected_congestion: 0.22675,
                },
                CascadeEntry {
                    port_code: "Z".into(),
                    cascade_risk_increase: 0.05,
                    is_source: false,
                    original_congestion: 0.0,
                    projected_congestion: 0.015,
                },
            ],
            propagation_depth: 2,
            total_impact_score: 1.4725,
        };
        let report = CascadeReport::new(&result, Utc::now());
        assert!((report.cascade_simulation[1].cascade_risk_increase - 42.25).abs() < 1e-9);
        assert!((report.cascade_simulation[0].projected_congestion - 80.0).abs() < 1e-9);
        assert!((report.total_impact_score - 147.25).abs() < 1e-9);
        assert_eq!(report.affected_ports, 2);
        assert_eq!(report.source_port, "A");
    }

    #[test]
    fn test_effect_direction() {
        assert_eq!(EffectDirection::from_effect(5.1), EffectDirection::Increase);
        assert_eq!(EffectDirection::from_effect(5.0), EffectDirection::Similar);
        assert_eq!(EffectDirection::from_effect(-5.0), EffectDirection::Similar);
        assert_eq!(EffectDirection::from_effect(-7.0), EffectDirection::Decrease);
    }

    #[test]
    fn test_baseline_comparison() {
        let risk = network_risk(vec![prediction("A", 0.6), prediction("B", 0.28)]);
        let cmp = BaselineComparison::new(
            vec![("A", 0.9), ("B", 0.25), ("GONE", 0.2)],
            &risk,
            Utc::now(),
        );
        let order: Vec<&str> = cmp.comparison.iter().map(|c| c.port_code.as_str()).collect();
        assert_eq!(order, vec!["A", "GONE", "B"]);
        assert_eq!(cmp.comparison[0].network_effect_direction, EffectDirection::Decrease);
        assert_eq!(cmp.comparison[2].network_effect_direction, EffectDirection::Similar);
        assert_eq!(cmp.summary.ports_with_significant_network_effects, 2);
        assert!((cmp.summary.max_network_effect - 3.0).abs() < 1e-9);
        assert!((cmp.summary.avg_baseline_risk - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_comparison_summary() {
        let cmp = BaselineComparison::new(
            Vec::<(&str, f64)>::new(),
            &NetworkRisk::empty(BackendVariant::Attention),
            Utc::now(),
        );
        assert!(cmp.comparison.is_empty());
        assert_eq!(cmp.summary, ComparisonSummary::default());
    }

    #[test]
    fn test_model_info() {
        let info = ModelInfo::new(BackendVariant::Attention);
        assert_eq!(info.model_version, "1.0.0-gat");
        assert_eq!(info.layers, 3);
        assert_eq!(info.attention_heads, 4);
        assert_eq!(info.node_features.len(), 6);
        assert_eq!(info.edge_features.len(), 4);
        assert!(info.network_aware);
    }
}
