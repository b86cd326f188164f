//! Risk prediction, cascade simulation and their output payloads.
//!
//! ## Modules
//!
//! - [`models`]: Risk levels, predictions and cascade results in [0, 1]
//! - [`engine`]: `RiskPropagationEngine` (backend forward pass + ranking)
//! - [`cascade`]: `CascadeSimulator` (hop-decayed BFS, reachability depth)
//! - [`report`]: 0–100 payloads, baseline comparison, model info
//! - [`cache`]: TTL cache keyed by snapshot fingerprint

pub mod cache;
pub mod cascade;
pub mod engine;
pub mod models;
pub mod report;

pub use cache::{fingerprint, PredictionCache};
pub use cascade::{reachability_depth, CascadeSimulator};
pub use engine::RiskPropagationEngine;
pub use models::{
    CascadeEntry, CascadeResult, NetworkRisk, NodePrediction, RiskLevel, RiskLevelCounts,
};
pub use report::{BaselineComparison, CascadeReport, ModelInfo, NetworkRiskReport};
