//! Membership agent
//!
//! Ties the registry client, reconciler and heartbeat together the way a
//! hosting runtime starts them:
//!
//! 1. register this node with the registry (failure is logged, not fatal)
//! 2. send one heartbeat so the new check starts out passing
//! 3. spawn the reconciler and the heartbeat as two independent tasks
//!
//! Both tasks watch the same shutdown channel. On shutdown the reconciler
//! finishes its current cycle and stops; the heartbeat marks the node
//! critical with the shutdown reason before exiting. If the reconciler task
//! dies, the shutdown channel is signalled with the failure so the node is
//! marked critical instead of staying advertised.

use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::StrategyConfig;
use crate::error::Result;
use crate::heartbeat::{Heartbeat, DEFAULT_SHUTDOWN_REASON};
use crate::membership::{MembershipDriver, MembershipSet};
use crate::reconciler::Reconciler;
use crate::registry::{ConsulClient, RegistryClient};

/// Shutdown channel shared by the agent's tasks; `Some(reason)` means stop
pub type ShutdownReceiver = watch::Receiver<Option<String>>;

// ============================================================================
// Membership Agent
// ============================================================================

/// Registry-driven cluster membership for one node
pub struct MembershipAgent {
    config: StrategyConfig,
    registry: Arc<dyn RegistryClient>,
    driver: Arc<dyn MembershipDriver>,
}

impl MembershipAgent {
    /// Create an agent talking to the Consul agent at `config.root`
    pub fn new(config: StrategyConfig, driver: Arc<dyn MembershipDriver>) -> Result<Self> {
        config.validate()?;
        let registry = ConsulClient::new(&config)?;
        tracing::debug!(registry = %registry.root(), "Consul client ready");
        let registry = Arc::new(registry);
        Ok(Self {
            config,
            registry,
            driver,
        })
    }

    /// Create an agent with a custom registry client
    pub fn with_registry(
        config: StrategyConfig,
        registry: Arc<dyn RegistryClient>,
        driver: Arc<dyn MembershipDriver>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            driver,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Register this node with the registry
    ///
    /// Registration failure is not fatal: the reconciler can still discover
    /// peers, and a later restart re-registers.
    pub async fn register(&self) -> bool {
        tracing::info!(
            service = %self.config.service_name,
            port = self.config.service_port,
            registry = %self.config.root,
            "Registering with service registry"
        );

        match self
            .registry
            .register_self(&self.config.service_name, self.config.service_port)
            .await
        {
            Ok(()) => {
                tracing::info!(check_id = %self.config.check_id(), "Registration successful");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Registration failed");
                false
            }
        }
    }

    /// Register, send the first heartbeat, and spawn the background tasks
    pub async fn start(self) -> AgentHandle {
        self.register().await;

        let heartbeat = Heartbeat::new(
            self.config.service_name.clone(),
            self.registry.clone(),
            self.config.heartbeat_interval(),
        );
        heartbeat.beat().await;

        let reconciler = Reconciler::new(
            self.config.service_name.clone(),
            self.registry.clone(),
            self.driver.clone(),
            self.config.polling_interval(),
        );
        let tracked = reconciler.subscribe();

        let shutdown = Arc::new(watch::channel(None).0);
        let shutdown_rx = shutdown.subscribe();

        let heartbeat_handle = tokio::spawn(heartbeat.run(shutdown_rx.clone()));
        let reconciler_handle = tokio::spawn(supervise(
            tokio::spawn(reconciler.run(shutdown_rx)),
            Arc::downgrade(&shutdown),
        ));

        tracing::info!(
            service = %self.config.service_name,
            local_node = ?self.config.local_node(),
            "Membership agent started"
        );

        AgentHandle {
            reconciler_handle,
            heartbeat_handle,
            shutdown,
            tracked,
        }
    }
}

/// Wait for the reconciler task; if it dies, shut the heartbeat down too
///
/// Only a weak reference to the sender is held so that dropping the
/// [`AgentHandle`] still closes the channel.
async fn supervise(
    reconciler: JoinHandle<MembershipSet>,
    shutdown: Weak<watch::Sender<Option<String>>>,
) -> Option<MembershipSet> {
    match reconciler.await {
        Ok(tracked) => Some(tracked),
        Err(e) => {
            tracing::error!(error = %e, "Reconciler task failed");
            if let Some(shutdown) = shutdown.upgrade() {
                shutdown.send_replace(Some(format!("reconciler failed: {e}")));
            }
            None
        }
    }
}

// ============================================================================
// Agent Handle
// ============================================================================

/// Handle to a running membership agent
///
/// Dropping the handle without calling [`AgentHandle::shutdown`] also stops
/// both tasks, with the default shutdown reason.
pub struct AgentHandle {
    reconciler_handle: JoinHandle<Option<MembershipSet>>,
    heartbeat_handle: JoinHandle<()>,
    shutdown: Arc<watch::Sender<Option<String>>>,
    tracked: watch::Receiver<MembershipSet>,
}

impl AgentHandle {
    /// Snapshot of the last committed membership
    pub fn tracked(&self) -> MembershipSet {
        self.tracked.borrow().clone()
    }

    /// Receiver that changes after every committed cycle
    pub fn subscribe(&self) -> watch::Receiver<MembershipSet> {
        self.tracked.clone()
    }

    /// Check if both tasks are still running
    pub fn is_running(&self) -> bool {
        !self.reconciler_handle.is_finished() && !self.heartbeat_handle.is_finished()
    }

    /// Signal shutdown without waiting
    pub fn signal_shutdown(&self, reason: impl Into<String>) {
        self.shutdown.send_replace(Some(reason.into()));
    }

    /// Wait for both tasks to finish, returning the final tracked membership
    pub async fn wait(self) -> MembershipSet {
        let last_published = self.tracked.borrow().clone();
        let (reconciler, heartbeat) = tokio::join!(self.reconciler_handle, self.heartbeat_handle);

        if let Err(e) = heartbeat {
            tracing::error!(error = %e, "Heartbeat task failed");
        }

        match reconciler {
            Ok(Some(tracked)) => tracked,
            Ok(None) => last_published,
            Err(e) => {
                tracing::error!(error = %e, "Reconciler supervisor failed");
                last_published
            }
        }
    }

    /// Trigger shutdown with `reason` and wait
    pub async fn shutdown(self, reason: impl Into<String>) -> MembershipSet {
        self.signal_shutdown(reason);
        self.wait().await
    }

    /// Trigger shutdown with the default reason and wait
    pub async fn stop(self) -> MembershipSet {
        self.shutdown(DEFAULT_SHUTDOWN_REASON).await
    }
}
