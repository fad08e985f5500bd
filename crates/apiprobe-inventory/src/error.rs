//! Inventory error types.
//!
//! Every variant means the inventory is currently unavailable. None of them
//! is fatal: the reconciler logs the error and retries after one interval.

use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while reading the inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory unavailable: failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("inventory unavailable: {program} exited with {status}: {stderr}")]
    Exited {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("inventory unavailable: {program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("inventory unavailable: i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type InventoryResult<T> = Result<T, InventoryError>;
