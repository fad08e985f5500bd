//! Concurrency-safe gauge store keyed by `(name, ip)`.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::prometheus::render_prometheus;

/// Binary health of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// The last probe failed to get any response.
    Unhealthy,
    /// The last probe got a response (any status code).
    Healthy,
}

impl HealthStatus {
    /// Gauge value: 1 for healthy, 0 for unhealthy.
    pub fn value(self) -> u8 {
        match self {
            HealthStatus::Unhealthy => 0,
            HealthStatus::Healthy => 1,
        }
    }
}

/// One rendered gauge point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaugeSample {
    pub name: String,
    pub ip: String,
    pub status: HealthStatus,
}

type GaugeKey = (String, String);

/// Shared registry of health gauges.
///
/// Cheap to clone; all clones see the same gauges.
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    gauges: Arc<RwLock<BTreeMap<GaugeKey, HealthStatus>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gauge for `(name, ip)`, overwriting any previous value.
    pub fn set_status(&self, name: &str, ip: &str, status: HealthStatus) {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        gauges.insert((name.to_string(), ip.to_string()), status);
        trace!(%name, %ip, value = status.value(), "gauge set");
    }

    /// Remove the gauge for `(name, ip)`. Returns whether it existed.
    pub fn remove_status(&self, name: &str, ip: &str) -> bool {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        gauges
            .remove(&(name.to_string(), ip.to_string()))
            .is_some()
    }

    /// Current value for `(name, ip)`, if set.
    pub fn status(&self, name: &str, ip: &str) -> Option<HealthStatus> {
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        gauges.get(&(name.to_string(), ip.to_string())).copied()
    }

    /// Point-in-time copy of every gauge, ordered by `(name, ip)`.
    pub fn snapshot(&self) -> Vec<GaugeSample> {
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        gauges
            .iter()
            .map(|((name, ip), status)| GaugeSample {
                name: name.clone(),
                ip: ip.clone(),
                status: *status,
            })
            .collect()
    }

    /// Render all gauges in Prometheus text format.
    pub fn render(&self) -> String {
        render_prometheus(&self.snapshot())
    }

    pub fn len(&self) -> usize {
        self.gauges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
