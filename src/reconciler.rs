//! Membership reconciliation loop
//!
//! Each cycle discovers the desired membership from the registry, diffs it
//! against the tracked set, asks the driver to apply the difference and then
//! commits what was actually applied:
//!
//! ```text
//! discover ──► delta ──► disconnect(to_remove) ──► connect(to_add) ──► commit ──► sleep
//!    │                          │                        │
//!    └─ error: keep tracked     └─ failed: keep tracked  └─ failed: drop
//! ```
//!
//! The reconciler is the only writer of the tracked [`MembershipSet`]. The
//! next cycle is armed only after the current one has committed, so cycles
//! never overlap.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::agent::ShutdownReceiver;
use crate::error::{ApplyAction, Error, ErrorCategory, RosterErrorTrait};
use crate::membership::{ApplyFailure, Delta, MembershipDriver, MembershipSet};
use crate::metrics;
use crate::registry::RegistryClient;

// ============================================================================
// Cycle Report
// ============================================================================

/// What a single reconciliation cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// Discovery failed; tracked membership was left unchanged
    DiscoveryFailed {
        reason: String,
        category: ErrorCategory,
    },

    /// Delta was applied (possibly partially) and the result committed
    Applied(CycleSummary),
}

impl CycleReport {
    pub fn is_discovery_failure(&self) -> bool {
        matches!(self, Self::DiscoveryFailed { .. })
    }

    pub fn summary(&self) -> Option<&CycleSummary> {
        match self {
            Self::Applied(summary) => Some(summary),
            Self::DiscoveryFailed { .. } => None,
        }
    }
}

/// Outcome of an applied cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Nodes connected and now tracked
    pub added: MembershipSet,

    /// Nodes disconnected and no longer tracked
    pub removed: MembershipSet,

    /// Nodes the driver failed to connect; not tracked
    pub failed_connects: Vec<ApplyFailure>,

    /// Nodes the driver failed to disconnect; still tracked
    pub failed_disconnects: Vec<ApplyFailure>,

    /// Size of the committed set
    pub tracked: usize,
}

impl CycleSummary {
    /// True when nothing needed to change
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.failed_connects.is_empty()
            && self.failed_disconnects.is_empty()
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Converges tracked membership toward the registry's view
pub struct Reconciler {
    service_name: String,
    registry: Arc<dyn RegistryClient>,
    driver: Arc<dyn MembershipDriver>,
    polling_interval: Duration,
    tracked: MembershipSet,
    published: watch::Sender<MembershipSet>,
}

impl Reconciler {
    pub fn new(
        service_name: impl Into<String>,
        registry: Arc<dyn RegistryClient>,
        driver: Arc<dyn MembershipDriver>,
        polling_interval: Duration,
    ) -> Self {
        let (published, _) = watch::channel(MembershipSet::new());

        Self {
            service_name: service_name.into(),
            registry,
            driver,
            polling_interval,
            tracked: MembershipSet::new(),
            published,
        }
    }

    /// Start from an already tracked set instead of an empty one
    pub fn with_tracked(mut self, tracked: MembershipSet) -> Self {
        self.published.send_replace(tracked.clone());
        self.tracked = tracked;
        self
    }

    /// Currently committed membership
    pub fn tracked(&self) -> &MembershipSet {
        &self.tracked
    }

    /// Receive a snapshot of the committed set after every cycle
    pub fn subscribe(&self) -> watch::Receiver<MembershipSet> {
        self.published.subscribe()
    }

    /// Run one discover → diff → apply → commit cycle
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();

        let discovered = match self.registry.discover(&self.service_name).await {
            Ok(discovered) => discovered,
            Err(e) => {
                tracing::warn!(
                    service = %self.service_name,
                    error = %e,
                    tracked = self.tracked.len(),
                    "Discovery failed, keeping current membership"
                );
                metrics::record_discovery_failure();
                return CycleReport::DiscoveryFailed {
                    reason: e.to_string(),
                    category: e.category(),
                };
            }
        };

        let Delta { to_add, to_remove } = self.tracked.delta(&discovered);

        // (tracked ∪ to_add) − to_remove, before corrections
        let mut candidate = discovered;

        let mut failed_disconnects = if to_remove.is_empty() {
            Vec::new()
        } else {
            self.driver.disconnect_many(&to_remove).await.into_failures()
        };
        failed_disconnects.retain(|f| to_remove.contains(&f.node));
        for failure in &failed_disconnects {
            candidate.insert(failure.node.clone());
        }

        let mut failed_connects = if to_add.is_empty() {
            Vec::new()
        } else {
            self.driver.connect_many(&to_add).await.into_failures()
        };
        failed_connects.retain(|f| to_add.contains(&f.node));
        for failure in &failed_connects {
            candidate.remove(&failure.node);
        }

        report_partial(ApplyAction::Disconnect, &failed_disconnects);
        report_partial(ApplyAction::Connect, &failed_connects);

        let removed = to_remove
            .into_iter()
            .filter(|node| !candidate.contains(node))
            .collect();
        let added = to_add
            .into_iter()
            .filter(|node| candidate.contains(node))
            .collect();

        self.commit(candidate);

        let summary = CycleSummary {
            added,
            removed,
            failed_connects,
            failed_disconnects,
            tracked: self.tracked.len(),
        };

        if summary.is_noop() {
            tracing::debug!(tracked = summary.tracked, "Membership unchanged");
        } else {
            tracing::info!(
                added = %summary.added,
                removed = %summary.removed,
                failed_connects = summary.failed_connects.len(),
                failed_disconnects = summary.failed_disconnects.len(),
                tracked = summary.tracked,
                "Membership reconciled"
            );
        }

        metrics::record_cycle(summary.tracked, started.elapsed().as_secs_f64());
        CycleReport::Applied(summary)
    }

    fn commit(&mut self, next: MembershipSet) {
        self.tracked = next;
        self.published.send_replace(self.tracked.clone());
    }

    /// Run cycles until shutdown is signalled, returning the final tracked set
    ///
    /// The polling timer is armed only after a cycle commits. A shutdown
    /// arriving mid-cycle takes effect once that cycle has finished.
    pub async fn run(mut self, mut shutdown_rx: ShutdownReceiver) -> MembershipSet {
        tracing::info!(
            service = %self.service_name,
            interval = ?self.polling_interval,
            "Reconciler started"
        );

        loop {
            if shutdown_rx.borrow().is_some() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.polling_interval) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(tracked = self.tracked.len(), "Reconciler shutting down");
        self.tracked
    }
}

fn report_partial(action: ApplyAction, failures: &[ApplyFailure]) {
    if failures.is_empty() {
        return;
    }

    for failure in failures {
        tracing::warn!(
            action = %action,
            node = %failure.node,
            reason = %failure.reason,
            "Membership driver could not apply change"
        );
    }

    let err = Error::PartialApply {
        action,
        failures: failures.to_vec(),
    };
    tracing::warn!(error = %err, "Partial apply absorbed into tracked membership");
    metrics::record_apply_failures(action.as_str(), failures.len());
}
