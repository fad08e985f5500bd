//! Exporter wiring: reconciler loop + metrics server + shutdown.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use apiprobe_health::HttpsProbe;
use apiprobe_inventory::KubectlInventory;
use apiprobe_metrics::HealthRegistry;
use apiprobe_reconcile::{Reconciler, ReconcilerConfig};
use tokio::sync::watch;
use tracing::{error, info};

pub struct ExporterConfig {
    pub listen: SocketAddr,
    pub namespace: String,
    pub kubectl: String,
    pub inventory_timeout: Duration,
}

pub async fn run(config: ExporterConfig) -> anyhow::Result<()> {
    info!(namespace = %config.namespace, "apiprobe exporter starting");

    // ── Subsystems ─────────────────────────────────────────────

    let registry = HealthRegistry::new();
    let inventory =
        KubectlInventory::new(config.kubectl, &config.namespace, config.inventory_timeout);
    let probe = HttpsProbe::api_server().context("failed to build probe TLS config")?;
    let reconciler = Reconciler::new(
        inventory,
        probe,
        registry.clone(),
        ReconcilerConfig::default(),
    );

    // Binding the scrape port is the one unrecoverable failure.
    let listener = apiprobe_api::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", config.listen))?;

    // ── Background tasks ───────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconcile_handle = tokio::spawn(reconciler.run(shutdown_rx));

    // ── Metrics server ─────────────────────────────────────────

    let router = apiprobe_api::build_router(registry);
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await;

    // Probers are cancelled and their gauges removed before we exit.
    if let Err(e) = reconcile_handle.await {
        error!(error = %e, "reconciler task failed");
    }

    served.context("metrics server failed")?;
    info!("apiprobe exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
