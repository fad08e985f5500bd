//! apiprobe-metrics — the `api_health_status` gauge.
//!
//! Holds one gauge value per `(name, ip)` label pair and renders the whole
//! set in the Prometheus text exposition format for the `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! HealthRegistry (Clone, shared)
//!   ├── set_status()    ← one writer per prober task
//!   ├── remove_status() ← prober cleanup on cancellation
//!   └── render()        → render_prometheus() → text/plain for /metrics
//! ```
//!
//! There is no history: each write overwrites the previous value for its
//! label pair, and a removed pair disappears from the next scrape.

pub mod prometheus;
pub mod registry;

pub use prometheus::{METRIC_HELP, METRIC_NAME, render_prometheus};
pub use registry::{GaugeSample, HealthRegistry, HealthStatus};
