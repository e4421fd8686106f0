//! Registry heartbeat
//!
//! Keeps this node's TTL check passing while the agent runs and marks it
//! critical on the way out. Heartbeat failures are logged and otherwise
//! ignored; they never touch membership.

use std::sync::Arc;
use std::time::Duration;

use crate::agent::ShutdownReceiver;
use crate::metrics;
use crate::registry::{HealthStatus, RegistryClient};

/// Output attached to every passing report
pub const RUNNING_OUTPUT: &str = "node is running";

/// Reason used when shutdown happens without an explicit one
pub const DEFAULT_SHUTDOWN_REASON: &str = "node is shutting down";

/// Periodic liveness reporter
pub struct Heartbeat {
    service_name: String,
    registry: Arc<dyn RegistryClient>,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(
        service_name: impl Into<String>,
        registry: Arc<dyn RegistryClient>,
        interval: Duration,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            registry,
            interval,
        }
    }

    /// Report `status` with `output`; returns whether the registry accepted it
    pub async fn report(&self, status: HealthStatus, output: &str) -> bool {
        match self
            .registry
            .report_health(&self.service_name, status, output)
            .await
        {
            Ok(()) => {
                tracing::debug!(status = %status, "Health report sent");
                metrics::record_heartbeat(status.as_str(), true);
                true
            }
            Err(e) => {
                tracing::warn!(status = %status, error = %e, "Health report failed");
                metrics::record_heartbeat(status.as_str(), false);
                false
            }
        }
    }

    /// Report the node as passing
    pub async fn beat(&self) -> bool {
        self.report(HealthStatus::Passing, RUNNING_OUTPUT).await
    }

    /// Mark the node critical so the registry stops advertising it
    pub async fn revoke(&self, reason: &str) -> bool {
        tracing::info!(reason = %reason, "Revoking registry liveness");
        self.report(HealthStatus::Critical, reason).await
    }

    /// Beat every interval until shutdown, then revoke once
    ///
    /// A dropped shutdown sender counts as shutdown, so losing the agent
    /// handle still revokes liveness.
    pub async fn run(self, mut shutdown_rx: ShutdownReceiver) {
        loop {
            if shutdown_rx.borrow().is_some() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.beat().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let reason = shutdown_rx
            .borrow()
            .clone()
            .unwrap_or_else(|| DEFAULT_SHUTDOWN_REASON.to_string());

        tracing::info!("Heartbeat task shutting down");
        self.revoke(&reason).await;
    }
}
