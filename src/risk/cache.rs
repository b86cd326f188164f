//! Short-TTL result cache.
//!
//! Results are keyed by a SHA-256 fingerprint of the snapshot, so a
//! structurally different snapshot never hits a stale entry. Loads are
//! coalesced: concurrent callers for the same key wait for the one in-flight
//! computation instead of repeating it. Failed computations are not cached.

use std::time::Duration;

use moka::sync::Cache;
use sha2::{Digest, Sha256};

use crate::error::{Result, RiskError};
use crate::network::models::{PortSnapshot, RouteSnapshot, Snapshot};
use crate::CacheSettings;

/// Upper bound on the configurable TTL (one day).
const MAX_TTL_SECS: f64 = 86_400.0;

/// TTL cache of computed payloads.
#[derive(Clone)]
pub struct PredictionCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<String, V>,
}

impl<V> PredictionCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(settings: &CacheSettings) -> Self {
        let ttl = Duration::from_secs_f64(settings.ttl_secs.max(0.0).min(MAX_TTL_SECS));
        Self {
            inner: Cache::builder()
                .max_capacity(settings.max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Return the cached value or compute it once. Errors are returned to
    /// every waiting caller and leave no entry behind.
    pub fn try_get_or_compute(
        &self,
        key: String,
        compute: impl FnOnce() -> Result<V>,
    ) -> Result<V> {
        self.inner
            .try_get_with(key, compute)
            .map_err(RiskError::from_shared)
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Hex SHA-256 over a canonical encoding of the snapshot.
///
/// Numbers are hashed by their IEEE-754 bits, so NaN and the two infinities
/// produce distinct keys from each other and from every finite value.
pub fn fingerprint(snapshot: &Snapshot) -> String {
    let mut hasher = Sha256::new();

    put_len(&mut hasher, snapshot.ports.len());
    for port in &snapshot.ports {
        let PortSnapshot {
            code,
            congestion_level,
            wait_time_hours,
            capacity_teus,
            lat,
            lng,
            country,
        } = port;
        put_str(&mut hasher, code);
        put_f64(&mut hasher, *congestion_level);
        put_f64(&mut hasher, *wait_time_hours);
        put_opt_f64(&mut hasher, *capacity_teus);
        put_f64(&mut hasher, *lat);
        put_f64(&mut hasher, *lng);
        put_str(&mut hasher, country);
    }

    put_len(&mut hasher, snapshot.routes.len());
    for route in &snapshot.routes {
        let RouteSnapshot {
            origin_code,
            dest_code,
            distance_nm,
            typical_days,
            weather_impact,
            predicted_delay_days,
        } = route;
        put_str(&mut hasher, origin_code);
        put_str(&mut hasher, dest_code);
        put_f64(&mut hasher, *distance_nm);
        put_f64(&mut hasher, *typical_days);
        put_opt_f64(&mut hasher, weather_impact.as_ref().map(|w| w.risk_increase));
        put_opt_f64(&mut hasher, *predicted_delay_days);
    }

    hex::encode(hasher.finalize())
}

fn put_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_le_bytes());
}

fn put_str(hasher: &mut Sha256, value: &str) {
    put_len(hasher, value.len());
    hasher.update(value.as_bytes());
}

fn put_f64(hasher: &mut Sha256, value: f64) {
    hasher.update(value.to_bits().to_le_bytes());
}

fn put_opt_f64(hasher: &mut Sha256, value: Option<f64>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            put_f64(hasher, v);
        }
        None => hasher.update([0u8]),
    }
}
