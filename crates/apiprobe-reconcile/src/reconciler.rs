//! Reconciler — owner of the monitored set.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use apiprobe_health::{Probe, ProberConfig, ProberHandle, spawn_prober};
use apiprobe_inventory::{Endpoint, Inventory, InventoryResult, InventorySource};
use apiprobe_metrics::HealthRegistry;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Time between two inventory reads.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Wait between cycles, also the retry delay after an inventory failure.
    pub interval: Duration,
    /// Settings handed to every spawned prober.
    pub prober: ProberConfig,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONCILE_INTERVAL,
            prober: ProberConfig::default(),
        }
    }
}

/// Identity of one spawned prober task. Never reused within a reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProberId(u64);

/// What one reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Newly discovered endpoints that got a prober.
    pub added: Vec<Endpoint>,
    /// Endpoints whose prober was cancelled because they vanished.
    pub removed: Vec<Endpoint>,
    /// Endpoints restarted against a new address (new address listed).
    pub readdressed: Vec<Endpoint>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.readdressed.is_empty()
    }
}

struct MonitorSlot {
    id: ProberId,
    prober: ProberHandle,
}

/// Keeps exactly one prober per inventoried endpoint name.
pub struct Reconciler<I, P> {
    inventory: I,
    probe: Arc<P>,
    registry: HealthRegistry,
    config: ReconcilerConfig,
    /// The monitored set: endpoint name → running prober.
    monitored: BTreeMap<String, MonitorSlot>,
    /// Cancelled probers that may still be cleaning up.
    stopping: Vec<ProberHandle>,
    next_id: u64,
}

impl<I: InventorySource, P: Probe> Reconciler<I, P> {
    pub fn new(inventory: I, probe: P, registry: HealthRegistry, config: ReconcilerConfig) -> Self {
        Self {
            inventory,
            probe: Arc::new(probe),
            registry,
            config,
            monitored: BTreeMap::new(),
            stopping: Vec::new(),
            next_id: 0,
        }
    }

    /// Read the inventory and apply it.
    ///
    /// On error the monitored set is left exactly as it was.
    pub async fn reconcile_once(&mut self) -> InventoryResult<ReconcileReport> {
        let inventory = self.inventory.list_endpoints().await?;
        Ok(self.apply(&inventory))
    }

    /// Diff `inventory` against the monitored set and start/stop probers.
    pub fn apply(&mut self, inventory: &Inventory) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        self.stopping.retain(|prober| !prober.is_finished());

        let stale: Vec<String> = self
            .monitored
            .iter()
            .filter(|(name, slot)| inventory.get(*name) != Some(&slot.prober.endpoint().address))
            .map(|(name, _)| name.clone())
            .collect();

        for name in stale {
            let Some(slot) = self.monitored.remove(&name) else {
                continue;
            };
            let old = slot.prober.endpoint().clone();
            slot.prober.cancel();
            self.stopping.push(slot.prober);

            match inventory.get(&name) {
                Some(address) => {
                    info!(%name, old_ip = %old.address, new_ip = %address, "address changed, restarting monitor");
                    let endpoint = Endpoint::new(name, address.clone());
                    self.start(endpoint.clone());
                    report.readdressed.push(endpoint);
                }
                None => {
                    info!(name = %old.name, ip = %old.address, "endpoint gone, stopping monitor");
                    report.removed.push(old);
                }
            }
        }

        for (name, address) in inventory {
            if self.monitored.contains_key(name) {
                continue;
            }
            let endpoint = Endpoint::new(name.clone(), address.clone());
            info!(%name, ip = %address, "endpoint discovered, starting monitor");
            self.start(endpoint.clone());
            report.added.push(endpoint);
        }

        report
    }

    fn start(&mut self, endpoint: Endpoint) {
        let id = ProberId(self.next_id);
        self.next_id += 1;

        let name = endpoint.name.clone();
        let prober = spawn_prober(
            endpoint,
            self.probe.clone(),
            self.registry.clone(),
            &self.config.prober,
        );
        self.monitored.insert(name, MonitorSlot { id, prober });
    }

    /// Reconcile every interval until `shutdown` fires, then stop all probers.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "reconciler started"
        );

        loop {
            let result = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.reconcile_once() => result,
            };

            match result {
                Ok(report) if report.is_empty() => {
                    debug!(monitored = self.monitored.len(), "inventory unchanged");
                }
                Ok(report) => {
                    info!(
                        added = report.added.len(),
                        removed = report.removed.len(),
                        readdressed = report.readdressed.len(),
                        monitored = self.monitored.len(),
                        "monitored set updated"
                    );
                }
                Err(e) => {
                    error!(error = %e, "error getting service endpoints, keeping current monitors");
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!("reconciler shutting down");
        self.stop_all().await;
    }

    /// Cancel every prober and wait until all of them have cleaned up.
    pub async fn stop_all(&mut self) {
        let monitored = std::mem::take(&mut self.monitored);
        for slot in monitored.values() {
            slot.prober.cancel();
        }
        for (_, slot) in monitored {
            slot.prober.stop().await;
        }
        self.await_stopped().await;
        info!("all monitors stopped");
    }

    /// Wait for every cancelled prober to finish its cleanup.
    pub async fn await_stopped(&mut self) {
        for prober in self.stopping.drain(..) {
            prober.stop().await;
        }
    }

    pub fn is_monitoring(&self, name: &str) -> bool {
        self.monitored.contains_key(name)
    }

    /// Names in the monitored set, sorted.
    pub fn monitored_names(&self) -> Vec<String> {
        self.monitored.keys().cloned().collect()
    }

    pub fn prober_id(&self, name: &str) -> Option<ProberId> {
        self.monitored.get(name).map(|slot| slot.id)
    }

    pub fn len(&self) -> usize {
        self.monitored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitored.is_empty()
    }
}
