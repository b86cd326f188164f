//! Port Risk Engine
//!
//! Network risk propagation and cascade simulation for shipping ports:
//! - Typed port graph built from point-in-time operational snapshots
//! - Message-passing risk propagation with three interchangeable backends
//! - Breadth-first, hop-decayed cascade simulation
//! - Visualization export and a short-TTL result cache
//!
//! ## Architecture
//!
//! ```text
//! Snapshot ─► network (graph + features) ─► propagation backend ─► risk engine
//!                   │                                                  │
//!                   └────────► cascade simulator            report + cache
//! ```
//!
//! [`service::RiskService`] ties the pieces together; it is built once at
//! startup from a [`Config`].

pub mod error;
pub mod network;
pub mod propagation;
pub mod risk;
pub mod service;

pub use error::{Result, RiskError};
pub use network::Snapshot;
pub use propagation::{BackendPreference, BackendVariant};
pub use service::RiskService;

use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub model: ModelConfig,
    pub cascade: CascadeSettings,
    pub cache: CacheSettings,
    pub network: NetworkSettings,
}

/// Propagation backend section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// `auto`, `attention`, `edge_blind` or `averaging`
    pub backend: BackendPreference,
    /// Safetensors checkpoint; seeded weights are generated when absent
    pub weights_path: Option<PathBuf>,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            weights_path: None,
            seed: 42,
        }
    }
}

/// Cascade simulation section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CascadeSettings {
    /// Multiplier applied per hop
    pub hop_decay: f64,
    /// Values at or below this are recorded but not spread further
    pub propagation_cutoff: f64,
    /// Share of the increase added to congestion in `projected_congestion`
    pub congestion_gain: f64,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            hop_decay: 0.65,
            propagation_cutoff: 0.1,
            congestion_gain: 0.3,
        }
    }
}

impl CascadeSettings {
    /// Replace any value outside [0, 1] (or NaN) with its default, logging a
    /// warning. Keeps cascade values and projected congestion within [0, 1].
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let check = |name: &str, value: f64, default: f64| {
            if (0.0..=1.0).contains(&value) {
                value
            } else {
                tracing::warn!(
                    "Ignoring cascade.{} = {} (expected a value in [0, 1]), using {}",
                    name,
                    value,
                    default
                );
                default
            }
        };
        Self {
            hop_decay: check("hop_decay", self.hop_decay, defaults.hop_decay),
            propagation_cutoff: check(
                "propagation_cutoff",
                self.propagation_cutoff,
                defaults.propagation_cutoff,
            ),
            congestion_gain: check(
                "congestion_gain",
                self.congestion_gain,
                defaults.congestion_gain,
            ),
        }
    }
}

/// Result cache section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: f64,
    pub max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 30.0,
            max_entries: 16,
        }
    }
}

/// Snapshot adaptation section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Ports in these countries are flagged as origin ports
    pub origin_countries: Vec<String>,
    /// Capacity used when a snapshot omits `capacity_teus`
    pub default_capacity_teus: f64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            origin_countries: vec![
                "Taiwan".into(),
                "China".into(),
                "Hong Kong".into(),
                "Singapore".into(),
            ],
            default_capacity_teus: 10_000_000.0,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub model: ModelConfig,
    pub cascade: CascadeSettings,
    pub cache: CacheSettings,
    pub network: NetworkSettings,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. A missing or
    /// malformed file falls back to defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> anyhow::Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let mut model = yaml.model;
        if let Ok(value) = std::env::var("PORTRISK_BACKEND") {
            match value.parse() {
                Ok(backend) => model.backend = backend,
                Err(e) => tracing::warn!("Ignoring PORTRISK_BACKEND: {}", e),
            }
        }
        if let Ok(path) = std::env::var("PORTRISK_WEIGHTS") {
            model.weights_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        let mut cache = yaml.cache;
        if let Some(ttl) = std::env::var("PORTRISK_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            cache.ttl_secs = ttl;
        }

        Ok(Self {
            model,
            cascade: yaml.cascade.sanitized(),
            cache,
            network: yaml.network,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
