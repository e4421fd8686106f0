//! Membership driver interface
//!
//! The driver is supplied by the hosting clustering runtime. It owns the
//! actual transport-level connections; the reconciler only asks it to
//! connect or disconnect peers and records what it reports back.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ApplyFailure, ApplyOutcome, MembershipSet, NodeId};

/// Connects and disconnects concrete peers
#[async_trait]
pub trait MembershipDriver: Send + Sync {
    /// Connect to every node in `nodes`, reporting the ones that failed
    async fn connect_many(&self, nodes: &MembershipSet) -> ApplyOutcome;

    /// Disconnect from every node in `nodes`, reporting the ones that failed
    async fn disconnect_many(&self, nodes: &MembershipSet) -> ApplyOutcome;

    /// Peers the runtime is currently connected to
    async fn list_connected(&self) -> MembershipSet;
}

// ============================================================================
// In-Memory Driver
// ============================================================================

#[derive(Debug, Default)]
struct DriverState {
    connected: MembershipSet,
    refuse_connect: HashMap<NodeId, String>,
    refuse_disconnect: HashMap<NodeId, String>,
}

/// Driver that keeps connections as an in-memory set
///
/// Useful for dry runs and tests. Individual nodes can be configured to
/// refuse connects or disconnects with a fixed reason.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDriver {
    state: Arc<RwLock<DriverState>>,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already connected set
    pub fn with_connected(connected: MembershipSet) -> Self {
        Self {
            state: Arc::new(RwLock::new(DriverState {
                connected,
                ..Default::default()
            })),
        }
    }

    /// Make every future connect to `node` fail with `reason`
    pub async fn refuse_connect(&self, node: NodeId, reason: impl Into<String>) {
        self.state
            .write()
            .await
            .refuse_connect
            .insert(node, reason.into());
    }

    /// Make every future disconnect from `node` fail with `reason`
    pub async fn refuse_disconnect(&self, node: NodeId, reason: impl Into<String>) {
        self.state
            .write()
            .await
            .refuse_disconnect
            .insert(node, reason.into());
    }

    /// Clear all injected failures
    pub async fn clear_refusals(&self) {
        let mut state = self.state.write().await;
        state.refuse_connect.clear();
        state.refuse_disconnect.clear();
    }
}

#[async_trait]
impl MembershipDriver for InMemoryDriver {
    async fn connect_many(&self, nodes: &MembershipSet) -> ApplyOutcome {
        let mut state = self.state.write().await;
        let mut failures = Vec::new();

        for node in nodes {
            if let Some(reason) = state.refuse_connect.get(node) {
                failures.push(ApplyFailure::new(node.clone(), reason.clone()));
            } else {
                state.connected.insert(node.clone());
            }
        }

        ApplyOutcome::from_failures(failures)
    }

    async fn disconnect_many(&self, nodes: &MembershipSet) -> ApplyOutcome {
        let mut state = self.state.write().await;
        let mut failures = Vec::new();

        for node in nodes {
            if let Some(reason) = state.refuse_disconnect.get(node) {
                failures.push(ApplyFailure::new(node.clone(), reason.clone()));
            } else {
                state.connected.remove(node);
            }
        }

        ApplyOutcome::from_failures(failures)
    }

    async fn list_connected(&self) -> MembershipSet {
        self.state.read().await.connected.clone()
    }
}
