//! Per-endpoint polling task.
//!
//! A prober is either polling (waiting on its ticker or its cancellation
//! signal) or stopped. Cancellation is checked before every tick and also
//! races the in-flight probe, so once it is observed no further gauge
//! write happens. On the way out the prober removes its own gauge.

use std::sync::Arc;
use std::time::Duration;

use apiprobe_inventory::Endpoint;
use apiprobe_metrics::{HealthRegistry, HealthStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::checker::Probe;

/// Time between two probes of the same endpoint.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Polling period; the first probe fires one period after start.
    pub interval: Duration,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Owner side of a running prober.
///
/// Dropping the handle without calling [`cancel`](Self::cancel) also stops
/// the task, since the closed channel is treated as cancellation.
#[derive(Debug)]
pub struct ProberHandle {
    endpoint: Endpoint,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ProberHandle {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Signal the prober to stop. Cleanup happens asynchronously.
    pub fn cancel(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signal the prober to stop and wait until its gauge is removed.
    pub async fn stop(self) {
        self.cancel();
        if let Err(e) = self.handle.await {
            warn!(name = %self.endpoint.name, error = %e, "prober task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Start polling `endpoint` in a background task.
pub fn spawn_prober<P: Probe>(
    endpoint: Endpoint,
    probe: Arc<P>,
    registry: HealthRegistry,
    config: &ProberConfig,
) -> ProberHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval = config.interval;
    let task_endpoint = endpoint.clone();

    let handle = tokio::spawn(async move {
        run_prober(&task_endpoint, probe.as_ref(), &registry, interval, shutdown_rx).await;
    });

    ProberHandle {
        endpoint,
        shutdown_tx,
        handle,
    }
}

/// The polling loop for a single endpoint.
pub async fn run_prober<P: Probe>(
    endpoint: &Endpoint,
    probe: &P,
    registry: &HealthRegistry,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let Endpoint { name, address } = endpoint;
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(%name, ip = %address, interval_secs = interval.as_secs(), "monitoring started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                debug!(%name, ip = %address, "probing");
                let outcome = tokio::select! {
                    biased;
                    _ = shutdown.changed() => None,
                    outcome = probe.probe(address) => Some(outcome),
                };
                let Some(outcome) = outcome else { break };

                match outcome {
                    Ok(status) => {
                        registry.set_status(name, address, HealthStatus::Healthy);
                        info!(%name, ip = %address, status = status.as_u16(), "successfully connected");
                    }
                    Err(e) => {
                        registry.set_status(name, address, HealthStatus::Unhealthy);
                        warn!(%name, ip = %address, error = %e, "error connecting");
                    }
                }
            }
        }
    }

    registry.remove_status(name, address);
    info!(%name, ip = %address, "monitoring stopped");
}
