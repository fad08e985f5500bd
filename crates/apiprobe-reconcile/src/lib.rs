//! apiprobe-reconcile — the inventory ↔ prober reconciliation loop.
//!
//! The [`Reconciler`] exclusively owns the monitored set: endpoint name →
//! running prober. Every cycle it reads a fresh inventory snapshot and
//! diffs it against that set.
//!
//! ```text
//! loop every 60s:
//!   inventory = source.list_endpoints()   (on error: log, keep set, retry)
//!   for name in set - inventory:          cancel prober
//!   for name in set ∩ inventory, new ip:  cancel prober, start new one
//!   for name in inventory - set:          start prober
//! ```
//!
//! Probers never touch the monitored set. They receive a cancellation
//! signal, remove their own gauge and exit; the reconciler keeps the
//! cancelled handles until the tasks have finished.

pub mod reconciler;

pub use reconciler::{
    DEFAULT_RECONCILE_INTERVAL, ProberId, ReconcileReport, Reconciler, ReconcilerConfig,
};
