//! Port network data models.
//!
//! ## Input types (operational snapshot)
//! - [`Snapshot`] / [`PortSnapshot`] / [`RouteSnapshot`]: the point-in-time
//!   payload produced by the operational-data collaborator
//!
//! ## Domain types (graph build)
//! - [`PortNode`]: a port with its congestion telemetry
//! - [`RouteEdge`]: a shipping lane between two ports
//!
//! [`Snapshot::to_network`] converts the former into the latter.

use serde::{Deserialize, Serialize};

use crate::NetworkSettings;

// ============================================================================
// Input types: operational snapshot
// ============================================================================

/// One port as reported by the live data feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSnapshot {
    /// UN/LOCODE-style port code (e.g. "SGSIN")
    pub code: String,
    /// Congestion level in [0, 1]
    pub congestion_level: f64,
    /// Average vessel wait before berthing, in hours
    pub wait_time_hours: f64,
    /// Annual throughput capacity in TEU (feed default applied when absent)
    #[serde(default)]
    pub capacity_teus: Option<f64>,
    pub lat: f64,
    pub lng: f64,
    /// Country name, used to flag origin ports
    #[serde(default)]
    pub country: String,
}

/// Weather overlay attached to a route by the weather collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherImpact {
    /// Added risk on a 0–100 scale
    #[serde(default)]
    pub risk_increase: f64,
}

/// One shipping route as reported by the live data feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub origin_code: String,
    pub dest_code: String,
    pub distance_nm: f64,
    /// Typical transit time in days
    pub typical_days: f64,
    #[serde(default)]
    pub weather_impact: Option<WeatherImpact>,
    #[serde(default)]
    pub predicted_delay_days: Option<f64>,
}

/// Point-in-time operational snapshot consumed by the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub ports: Vec<PortSnapshot>,
    #[serde(default)]
    pub routes: Vec<RouteSnapshot>,
}

impl Snapshot {
    /// Convert the feed payload into graph build inputs.
    ///
    /// Applies the feed defaults (capacity, delay, weather) and derives
    /// `is_origin` from the configured origin countries. Route endpoints are
    /// not validated here; the graph store drops dangling routes.
    pub fn to_network(&self, settings: &NetworkSettings) -> (Vec<PortNode>, Vec<RouteEdge>) {
        let ports = self
            .ports
            .iter()
            .map(|p| PortNode {
                code: p.code.clone(),
                congestion_level: p.congestion_level,
                wait_time_hours: p.wait_time_hours,
                capacity_teu: p.capacity_teus.unwrap_or(settings.default_capacity_teus),
                lat: p.lat,
                lng: p.lng,
                is_origin: settings
                    .origin_countries
                    .iter()
                    .any(|c| c == &p.country),
                risk_score: None,
            })
            .collect();

        let routes = self
            .routes
            .iter()
            .map(|r| {
                let risk_increase = r
                    .weather_impact
                    .as_ref()
                    .map(|w| w.risk_increase)
                    .unwrap_or(0.0);
                RouteEdge {
                    origin_code: r.origin_code.clone(),
                    dest_code: r.dest_code.clone(),
                    distance_nm: r.distance_nm,
                    transit_time_days: r.typical_days,
                    weather_risk: unit_interval(risk_increase / 100.0),
                    current_delay_days: r.predicted_delay_days.unwrap_or(0.0),
                }
            })
            .collect();

        (ports, routes)
    }
}

/// Clamp into [0, 1], mapping NaN to 0.
pub(crate) fn unit_interval(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Domain types: graph nodes and edges
// ============================================================================

/// A port in the network graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortNode {
    /// Unique port code
    pub code: String,
    /// Congestion level in [0, 1]
    pub congestion_level: f64,
    /// Hours waited before berthing (>= 0)
    pub wait_time_hours: f64,
    /// Throughput capacity in TEU (> 0)
    pub capacity_teu: f64,
    pub lat: f64,
    pub lng: f64,
    /// Whether this port is an upstream origin (manufacturing hub)
    pub is_origin: bool,
    /// Risk score in [0, 1], absent until scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
}

impl PortNode {
    /// Create an unscored port with the given congestion.
    pub fn new(code: impl Into<String>, congestion_level: f64) -> Self {
        Self {
            code: code.into(),
            congestion_level,
            wait_time_hours: 0.0,
            capacity_teu: 10_000_000.0,
            lat: 0.0,
            lng: 0.0,
            is_origin: false,
            risk_score: None,
        }
    }
}

/// A shipping route between two ports.
///
/// Stored directed (origin → dest) but coupling both ends equally for
/// propagation and cascade purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEdge {
    pub origin_code: String,
    pub dest_code: String,
    /// Sailing distance in nautical miles (> 0)
    pub distance_nm: f64,
    /// Transit time in days (> 0)
    pub transit_time_days: f64,
    /// Weather risk in [0, 1]
    pub weather_risk: f64,
    /// Currently predicted delay in days (>= 0)
    pub current_delay_days: f64,
}

impl RouteEdge {
    /// Create a fair-weather route with no delay.
    pub fn new(origin: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            origin_code: origin.into(),
            dest_code: dest.into(),
            distance_nm: 1000.0,
            transit_time_days: 5.0,
            weather_risk: 0.0,
            current_delay_days: 0.0,
        }
    }
}
