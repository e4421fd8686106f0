//! roster - registry-driven cluster membership
//!
//! Discovers peer nodes through a Consul-compatible service registry, diffs
//! them against the peers this process is connected to, and drives
//! connect/disconnect calls until the two agree. A separate heartbeat keeps
//! this node's own registry check passing.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`membership`] - Node identifiers, membership sets, deltas and the driver trait
//! - [`registry`] - Registry client trait and the Consul HTTP implementation
//! - [`reconciler`] - The discover → diff → apply → commit loop
//! - [`heartbeat`] - Periodic liveness reports and final revocation
//! - [`agent`] - Startup sequence and task lifecycle
//! - [`config`] - Typed configuration with env/TOML loading
//! - [`error`] - Unified error type
//! - [`metrics`] - Prometheus metrics
//! - [`telemetry`] - Tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use roster::agent::MembershipAgent;
//! use roster::config::StrategyConfig;
//! use roster::membership::InMemoryDriver;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StrategyConfig::builder()
//!         .service_name("ledger")
//!         .service_port(4369)
//!         .local_address("10.0.3.17")
//!         .build()?;
//!
//!     let agent = MembershipAgent::new(config, Arc::new(InMemoryDriver::new()))?;
//!     let handle = agent.start().await;
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown("received ctrl-c").await;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod membership;
pub mod metrics;
pub mod reconciler;
pub mod registry;
pub mod telemetry;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{AgentHandle, MembershipAgent};
    pub use crate::config::StrategyConfig;
    pub use crate::error::{Error, ErrorCategory, Result, RosterErrorTrait};
    pub use crate::membership::{
        ApplyFailure, ApplyOutcome, Delta, MembershipDriver, MembershipSet, NodeId,
    };
    pub use crate::reconciler::{CycleReport, Reconciler};
    pub use crate::registry::{ConsulClient, HealthStatus, RegistryClient};
}

pub use agent::{AgentHandle, MembershipAgent};
pub use config::StrategyConfig;
