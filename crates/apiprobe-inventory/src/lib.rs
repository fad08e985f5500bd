//! apiprobe-inventory — discovery of the endpoints to monitor.
//!
//! The inventory is the set of tenant control-plane services and their
//! external load-balancer addresses, as reported by `kubectl`. Each read
//! produces a fresh [`Inventory`] snapshot; the reconciler diffs snapshots
//! against the probers it is currently running.
//!
//! # Architecture
//!
//! ```text
//! InventorySource (trait)
//!   └── KubectlInventory
//!         ├── spawn `kubectl -n <ns> get service ... --no-headers`
//!         ├── bounded by a timeout (child killed on expiry)
//!         └── parse_inventory() → Inventory
//! ```

pub mod error;
pub mod kubectl;
pub mod parser;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

pub use error::{InventoryError, InventoryResult};
pub use kubectl::KubectlInventory;
pub use parser::{UNASSIGNED_ADDRESS, parse_inventory};

/// A snapshot of the inventory: endpoint name → address.
///
/// Names are unique; a name listed twice keeps the last address seen.
pub type Inventory = BTreeMap<String, String>;

/// A single monitored endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    /// Stable identity key (the service name).
    pub name: String,
    /// Address the endpoint is reachable at (an IP or hostname, no port).
    pub address: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Anything that can list the endpoints to monitor.
///
/// Failures are transient: callers keep their previous view and retry on
/// the next cycle.
pub trait InventorySource: Send + Sync + 'static {
    fn list_endpoints(&self) -> impl Future<Output = InventoryResult<Inventory>> + Send;
}
