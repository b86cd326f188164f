//! Risk service facade.
//!
//! Owns the backend chosen at startup, the cascade simulator and the result
//! caches. Every entry point takes a snapshot, rebuilds the port graph from
//! it and answers from cache when the same snapshot was seen within the TTL.
//!
//! All methods are synchronous and CPU-bound; async callers should run them
//! on a blocking thread.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::network::export::{self, NetworkStructure};
use crate::network::models::{unit_interval, Snapshot};
use crate::network::store::PortGraph;
use crate::propagation::{select_backend, BackendVariant, PropagationBackend};
use crate::risk::cache::{fingerprint, PredictionCache};
use crate::risk::cascade::CascadeSimulator;
use crate::risk::engine::RiskPropagationEngine;
use crate::risk::models::NetworkRisk;
use crate::risk::report::{BaselineComparison, CascadeReport, ModelInfo, NetworkRiskReport};
use crate::{Config, NetworkSettings};

/// A computed prediction with both its internal and boundary forms.
#[derive(Debug, Clone)]
struct PredictionEntry {
    risk: NetworkRisk,
    report: NetworkRiskReport,
    computed_at: DateTime<Utc>,
}

/// Entry point for network risk prediction and cascade simulation.
pub struct RiskService {
    engine: RiskPropagationEngine,
    simulator: CascadeSimulator,
    network: NetworkSettings,
    predictions: PredictionCache<Arc<PredictionEntry>>,
    cascades: PredictionCache<Arc<CascadeReport>>,
}

impl RiskService {
    /// Build the service, selecting the propagation backend once.
    ///
    /// Fails only when no backend can be initialized.
    pub fn new(config: &Config) -> Result<Self> {
        let backend = select_backend(&config.model)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Build the service around an already constructed backend.
    pub fn with_backend(config: &Config, backend: Arc<dyn PropagationBackend>) -> Self {
        Self {
            engine: RiskPropagationEngine::new(backend),
            simulator: CascadeSimulator::new(config.cascade.clone()),
            network: config.network.clone(),
            predictions: PredictionCache::new(&config.cache),
            cascades: PredictionCache::new(&config.cache),
        }
    }

    pub fn variant(&self) -> BackendVariant {
        self.engine.variant()
    }

    /// Build the port graph for a snapshot.
    pub fn build_graph(&self, snapshot: &Snapshot) -> PortGraph {
        let (ports, routes) = snapshot.to_network(&self.network);
        let graph = PortGraph::build(ports, routes);
        if !graph.dropped_routes().is_empty() {
            debug!(
                "Built graph with {} ports and {} routes ({} routes dropped)",
                graph.node_count(),
                graph.edge_count(),
                graph.dropped_routes().len()
            );
        }
        graph
    }

    fn prediction(&self, snapshot: &Snapshot) -> Result<Arc<PredictionEntry>> {
        let key = fingerprint(snapshot);
        self.predictions.try_get_or_compute(key.clone(), || {
            info!("Computing network risk for snapshot {}", &key[..12]);
            let graph = self.build_graph(snapshot);
            let risk = self.engine.predict(&graph)?;
            let computed_at = Utc::now();
            Ok(Arc::new(PredictionEntry {
                report: NetworkRiskReport::new(&risk, computed_at),
                risk,
                computed_at,
            }))
        })
    }

    /// Network-wide risk prediction (0–100 payload).
    pub fn predict_network_risk(&self, snapshot: &Snapshot) -> Result<NetworkRiskReport> {
        Ok(self.prediction(snapshot)?.report.clone())
    }

    /// Simulate a failure at `source_port`.
    ///
    /// Port codes match case-sensitively. Unknown ports fail with
    /// [`crate::RiskError::UnknownPort`] and are not cached.
    pub fn simulate_cascade(&self, snapshot: &Snapshot, source_port: &str) -> Result<CascadeReport> {
        let key = format!("{}:{}", fingerprint(snapshot), source_port);
        let report = self.cascades.try_get_or_compute(key, || {
            info!("Simulating cascade from {}", source_port);
            let graph = self.build_graph(snapshot);
            let result = self.simulator.simulate(&graph, source_port)?;
            Ok(Arc::new(CascadeReport::new(&result, Utc::now())))
        })?;
        Ok(report.as_ref().clone())
    }

    /// Visualization structure, optionally annotated with risk scores.
    pub fn network_structure(
        &self,
        snapshot: &Snapshot,
        include_risk: bool,
    ) -> Result<NetworkStructure> {
        let mut graph = self.build_graph(snapshot);
        if include_risk {
            graph.annotate_risk(&self.prediction(snapshot)?.risk);
        }
        Ok(export::export(&graph))
    }

    /// Propagated risk against the congestion-only baseline, one row per
    /// port of the built graph.
    pub fn compare_with_baseline(&self, snapshot: &Snapshot) -> Result<BaselineComparison> {
        let entry = self.prediction(snapshot)?;
        let graph = self.build_graph(snapshot);
        debug!("Comparing {} ports against baseline", graph.node_count());
        Ok(BaselineComparison::new(
            graph
                .ports()
                .map(|p| (p.code.as_str(), unit_interval(p.congestion_level))),
            &entry.risk,
            entry.computed_at,
        ))
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo::new(self.variant())
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.predictions.invalidate_all();
        self.cascades.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::features::GraphTensors;
    use crate::network::models::{PortSnapshot, RouteSnapshot, WeatherImpact};
    use crate::propagation::{AveragingBackend, BackendOutput};
    use crate::CacheSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Averaging backend that counts forward passes.
    struct CountingBackend {
        inner: AveragingBackend,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl PropagationBackend for CountingBackend {
        fn variant(&self) -> BackendVariant {
            self.inner.variant()
        }

        fn forward(&self, input: &GraphTensors) -> anyhow::Result<BackendOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.inner.forward(input)
        }
    }

    fn counting_service(ttl_secs: f64, delay_ms: u64) -> (RiskService, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            inner: AveragingBackend::new(),
            calls: Arc::clone(&calls),
            delay: Duration::from_millis(delay_ms),
        };
        let config = Config {
            cache: CacheSettings {
                ttl_secs,
                ..CacheSettings::default()
            },
            ..Config::default()
        };
        (RiskService::with_backend(&config, Arc::new(backend)), calls)
    }

    fn port(code: &str, congestion: f64, country: &str) -> PortSnapshot {
        PortSnapshot {
            code: code.into(),
            congestion_level: congestion,
            wait_time_hours: 24.0,
            capacity_teus: Some(20_000_000.0),
            lat: 0.0,
            lng: 0.0,
            country: country.into(),
        }
    }

    fn route(origin: &str, dest: &str) -> RouteSnapshot {
        RouteSnapshot {
            origin_code: origin.into(),
            dest_code: dest.into(),
            distance_nm: 5000.0,
            typical_days: 14.0,
            weather_impact: Some(WeatherImpact { risk_increase: 20.0 }),
            predicted_delay_days: Some(1.0),
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            ports: vec![
                port("CNSHA", 0.9, "China"),
                port("USLAX", 0.3, "United States"),
                port("NLRTM", 0.1, "Netherlands"),
            ],
            routes: vec![
                route("CNSHA", "USLAX"),
                route("CNSHA", "NLRTM"),
                route("CNSHA", "GHOST"),
            ],
        }
    }

    #[test]
    fn test_predict_payload() {
        let (service, _) = counting_service(30.0, 0);
        let report = service.predict_network_risk(&snapshot()).unwrap();
        assert_eq!(report.total_nodes, 3);
        assert_eq!(report.total_edges, 2);
        assert_eq!(report.backend_variant, BackendVariant::Averaging);
        assert!(report
            .node_predictions
            .iter()
            .all(|p| (0.0..=100.0).contains(&p.risk_score)));
        let origin = report
            .node_predictions
            .iter()
            .find(|p| p.port_code == "CNSHA")
            .unwrap();
        assert!(origin.is_origin);
    }

    #[test]
    fn test_cached_within_ttl_is_identical() {
        let (service, calls) = counting_service(30.0, 0);
        let first = service.predict_network_risk(&snapshot()).unwrap();
        let second = service.predict_network_risk(&snapshot()).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_requests_compute_once() {
        let (service, calls) = counting_service(30.0, 50);
        let service = Arc::new(service);
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || service.predict_network_risk(&snapshot()).unwrap())
            })
            .collect();
        let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(reports.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expiry_triggers_recompute() {
        let (service, calls) = counting_service(0.05, 0);
        service.predict_network_risk(&snapshot()).unwrap();
        std::thread::sleep(Duration::from_millis(120));
        service.predict_network_risk(&snapshot()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_changed_snapshot_recomputes() {
        let (service, calls) = counting_service(30.0, 0);
        service.predict_network_risk(&snapshot()).unwrap();
        let mut changed = snapshot();
        changed.ports[1].congestion_level = 0.8;
        service.predict_network_risk(&changed).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_non_finite_congestion_is_not_served_from_cache() {
        let (service, calls) = counting_service(30.0, 0);
        let with_congestion = |value: f64| {
            let mut s = snapshot();
            s.ports[1].congestion_level = value;
            s
        };
        let input_of = |report: &NetworkRiskReport| {
            report
                .node_predictions
                .iter()
                .find(|p| p.port_code == "USLAX")
                .map(|p| p.congestion_input)
                .unwrap()
        };

        let saturated = service.predict_network_risk(&with_congestion(f64::INFINITY)).unwrap();
        assert_eq!(input_of(&saturated), 100.0);
        let drained = service.predict_network_risk(&with_congestion(f64::NEG_INFINITY)).unwrap();
        assert_eq!(input_of(&drained), 0.0);
        let missing = service.predict_network_risk(&with_congestion(f64::NAN)).unwrap();
        assert_eq!(input_of(&missing), 0.0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cascade_report() {
        let (service, _) = counting_service(30.0, 0);
        let report = service.simulate_cascade(&snapshot(), "CNSHA").unwrap();
        assert_eq!(report.cascade_simulation.len(), 3);
        assert_eq!(report.cascade_simulation[0].port_code, "CNSHA");
        assert_eq!(report.cascade_simulation[0].cascade_risk_increase, 100.0);
        assert_eq!(report.propagation_depth, 1);
        assert_eq!(report.affected_ports, 3);
        assert!((report.total_impact_score - 230.0).abs() < 1e-9);
    }

    #[test]
    fn test_cascade_unknown_port() {
        let (service, _) = counting_service(30.0, 0);
        let err = service.simulate_cascade(&snapshot(), "cnsha").unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_empty_snapshot() {
        let (service, calls) = counting_service(30.0, 0);
        let report = service.predict_network_risk(&Snapshot::default()).unwrap();
        assert_eq!(report.total_nodes, 0);
        assert_eq!(report.network_risk_score, 0.0);
        assert!(report.node_predictions.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_network_structure_with_risk() {
        let (service, _) = counting_service(30.0, 0);
        let plain = service.network_structure(&snapshot(), false).unwrap();
        assert_eq!(plain.node_count, 3);
        assert_eq!(plain.edge_count, 2);
        assert!(plain.nodes.iter().all(|n| n.risk_score.is_none()));

        let annotated = service.network_structure(&snapshot(), true).unwrap();
        assert!(annotated.nodes.iter().all(|n| n.risk_score.is_some()));
    }

    #[test]
    fn test_compare_uses_cached_prediction() {
        let (service, calls) = counting_service(30.0, 0);
        let prediction = service.predict_network_risk(&snapshot()).unwrap();
        let comparison = service.compare_with_baseline(&snapshot()).unwrap();
        assert_eq!(comparison.comparison.len(), 3);
        assert_eq!(comparison.timestamp, prediction.timestamp);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_compare_follows_built_graph() {
        let (service, _) = counting_service(30.0, 0);
        let mut s = snapshot();
        s.ports.push(port("CNSHA", 0.2, "China"));
        s.ports[2].congestion_level = f64::NAN;

        let comparison = service.compare_with_baseline(&s).unwrap();
        assert_eq!(comparison.comparison.len(), 3);
        let shanghai: Vec<_> = comparison
            .comparison
            .iter()
            .filter(|c| c.port_code == "CNSHA")
            .collect();
        assert_eq!(shanghai.len(), 1);
        assert_eq!(shanghai[0].baseline_risk, 90.0);
        let rotterdam = comparison
            .comparison
            .iter()
            .find(|c| c.port_code == "NLRTM")
            .unwrap();
        assert_eq!(rotterdam.baseline_risk, 0.0);
        assert!(!serde_json::to_string(&comparison).unwrap().contains("null"));
    }

    #[test]
    fn test_model_info_reports_backend() {
        let (service, _) = counting_service(30.0, 0);
        let info = service.model_info();
        assert_eq!(info.backend_variant, BackendVariant::Averaging);
        assert_eq!(info.model_version, "1.0.0-averaging");
    }

    #[test]
    fn test_clear_cache() {
        let (service, calls) = counting_service(30.0, 0);
        service.predict_network_risk(&snapshot()).unwrap();
        service.clear_cache();
        service.predict_network_risk(&snapshot()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
