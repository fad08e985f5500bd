//! `kubectl`-backed inventory source.
//!
//! Lists the services of one namespace with their first load-balancer
//! ingress IP. The command runs under a timeout; a hung `kubectl` is killed
//! and reported as unavailable instead of stalling reconciliation.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{InventoryError, InventoryResult};
use crate::parser::parse_inventory;
use crate::{Inventory, InventorySource};

/// Namespace the tenant control-plane services live in.
pub const DEFAULT_NAMESPACE: &str = "kamaji-tcp";

/// Upper bound on a single inventory read.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SERVICE_COLUMNS: &str =
    "custom-columns=NAME:.metadata.name,EXTERNAL-IP:.status.loadBalancer.ingress[0].ip";

/// Reads the inventory by shelling out to an external command.
#[derive(Debug, Clone)]
pub struct KubectlInventory {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl KubectlInventory {
    /// List services in `namespace` using the given `kubectl` binary.
    pub fn new(kubectl: impl Into<String>, namespace: &str, timeout: Duration) -> Self {
        Self::with_command(kubectl, service_list_args(namespace), timeout)
    }

    /// Run an arbitrary command whose stdout uses the two-column format.
    pub fn with_command(
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    async fn run(&self) -> InventoryResult<String> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InventoryError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| InventoryError::TimedOut {
                program: self.program.clone(),
                timeout: self.timeout,
            })??;

        if !output.status.success() {
            return Err(InventoryError::Exited {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for KubectlInventory {
    fn default() -> Self {
        Self::new("kubectl", DEFAULT_NAMESPACE, DEFAULT_TIMEOUT)
    }
}

impl InventorySource for KubectlInventory {
    async fn list_endpoints(&self) -> InventoryResult<Inventory> {
        let stdout = self.run().await?;
        let inventory = parse_inventory(&stdout);
        debug!(program = %self.program, endpoints = inventory.len(), "inventory read");
        Ok(inventory)
    }
}

/// Arguments for `kubectl` listing service names and external IPs.
pub fn service_list_args(namespace: &str) -> Vec<String> {
    [
        "-n",
        namespace,
        "get",
        "service",
        "-o",
        SERVICE_COLUMNS,
        "--no-headers",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> KubectlInventory {
        KubectlInventory::with_command(
            "sh",
            vec!["-c".to_string(), script.to_string()],
            Duration::from_secs(5),
        )
    }

    #[test]
    fn default_command_targets_namespace() {
        let inv = KubectlInventory::default();
        assert_eq!(inv.program, "kubectl");
        assert_eq!(
            inv.args,
            [
                "-n",
                "kamaji-tcp",
                "get",
                "service",
                "-o",
                "custom-columns=NAME:.metadata.name,EXTERNAL-IP:.status.loadBalancer.ingress[0].ip",
                "--no-headers",
            ]
        );
    }

    #[tokio::test]
    async fn reads_and_filters_command_output() {
        let inv = sh("printf 'a <none>\\nb 10.0.0.1\\n'");
        let endpoints = inv.list_endpoints().await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints["b"], "10.0.0.1");
    }

    #[tokio::test]
    async fn non_zero_exit_is_unavailable() {
        let inv = sh("echo 'connection refused' >&2; exit 1");
        let err = inv.list_endpoints().await.unwrap_err();
        match err {
            InventoryError::Exited { stderr, status, .. } => {
                assert_eq!(stderr, "connection refused");
                assert_eq!(status.code(), Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let inv = KubectlInventory::new(
            "/nonexistent/kubectl",
            DEFAULT_NAMESPACE,
            Duration::from_secs(1),
        );
        let err = inv.list_endpoints().await.unwrap_err();
        assert!(matches!(err, InventoryError::Spawn { .. }));
        assert!(err.to_string().starts_with("inventory unavailable"));
    }

    #[tokio::test]
    async fn hung_command_times_out() {
        let inv = KubectlInventory::with_command(
            "sleep",
            vec!["10".to_string()],
            Duration::from_millis(100),
        );
        let err = inv.list_endpoints().await.unwrap_err();
        assert!(matches!(err, InventoryError::TimedOut { .. }));
    }
}
