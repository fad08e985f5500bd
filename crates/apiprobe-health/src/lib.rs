//! apiprobe-health — reachability probing for monitored endpoints.
//!
//! One background task per endpoint polls `https://{address}:6443` on a
//! fixed interval and writes the outcome to the shared health gauge. Any
//! HTTP response counts as healthy; only transport failures count as
//! unhealthy. Status codes are logged but never classified.
//!
//! # Architecture
//!
//! ```text
//! spawn_prober() → ProberHandle (cancel / stop)
//!   └── run_prober() loop
//!       ├── watch::Receiver<bool>  (cancellation, always polled first)
//!       ├── interval tick → Probe::probe()
//!       │     └── HttpsProbe: TCP → TLS (no verification) → HTTP/1.1 GET /
//!       └── HealthRegistry::set_status() / remove_status() on exit
//! ```
//!
//! # Trust model
//!
//! Probe targets are tenant control planes serving self-signed
//! certificates, so server certificate verification is disabled (see
//! [`tls`]). A probe proves the endpoint answers TLS + HTTP, nothing about
//! its identity.

pub mod checker;
pub mod prober;
pub mod tls;

pub use checker::{DEFAULT_PROBE_PORT, DEFAULT_PROBE_TIMEOUT, HttpsProbe, Probe, ProbeError};
pub use prober::{DEFAULT_POLL_INTERVAL, ProberConfig, ProberHandle, spawn_prober};
