//! apiprobed — the apiprobe daemon.
//!
//! Discovers tenant control-plane services with `kubectl`, probes each
//! one's API server every 30 seconds, and serves the results as the
//! `api_health_status` gauge on `/metrics`.
//!
//! # Usage
//!
//! ```text
//! apiprobed --listen 0.0.0.0:8080 --namespace kamaji-tcp
//! ```

mod exporter;

use std::net::SocketAddr;

use apiprobe_api::DEFAULT_LISTEN_ADDR;
use apiprobe_inventory::kubectl::{DEFAULT_NAMESPACE, DEFAULT_TIMEOUT};
use clap::Parser;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,apiprobed=debug,apiprobe_reconcile=debug";

#[derive(Parser)]
#[command(name = "apiprobed", about = "Tenant control-plane health exporter", version)]
struct Cli {
    /// Address the metrics endpoint listens on.
    #[arg(long, default_value_t = DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,

    /// Namespace holding the control-plane services.
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// kubectl binary used to list services.
    #[arg(long, default_value = "kubectl")]
    kubectl: String,

    /// Give up on a kubectl invocation after this many seconds.
    #[arg(
        long,
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    inventory_timeout_secs: u64,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    exporter::run(exporter::ExporterConfig {
        listen: cli.listen,
        namespace: cli.namespace,
        kubectl: cli.kubectl,
        inventory_timeout: std::time::Duration::from_secs(cli.inventory_timeout_secs),
    })
    .await
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
