//! apiprobe-api — HTTP surface of the exporter.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` | Prometheus exposition of `api_health_status` |

pub mod handlers;

use std::net::SocketAddr;

use apiprobe_metrics::HealthRegistry;
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

/// Default scrape address.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 8080);

/// Shared state for handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: HealthRegistry,
}

/// Build the router serving `/metrics` from `registry`.
pub fn build_router(registry: HealthRegistry) -> Router {
    Router::new()
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(ApiState { registry })
}

/// Bind the scrape listener. Failure here is fatal for the exporter.
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "exporter is running");
    Ok(listener)
}
