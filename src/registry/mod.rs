//! Service registry access
//!
//! The reconciler and the heartbeat talk to the registry only through the
//! [`RegistryClient`] trait. [`ConsulClient`] is the HTTP implementation for
//! Consul-compatible agents.
//!
//! # Endpoints
//!
//! ```text
//! PUT /v1/agent/service/register              register this node
//! PUT /v1/agent/check/update/<check-id>       report TTL check status
//! GET /v1/health/service/<name>?passing=true  discover healthy peers
//! ```

pub mod consul;
pub mod types;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::membership::MembershipSet;

pub use consul::ConsulClient;

// ============================================================================
// Health Status
// ============================================================================

/// Status reported for this node's liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Passing,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passing => "passing",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors returned by registry calls
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Client could not be constructed
    #[error("Registry client initialization failed: {0}")]
    Init(String),

    /// Registry unreachable, connection reset, or call timed out
    #[error("Registry unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// Registry answered with a non-2xx status
    #[error("Registry returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 2xx response whose body could not be understood
    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),
}

impl RegistryError {
    /// Whether retrying on the next cycle can succeed
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Init(_))
    }

    /// True for failures to reach the registry at all
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

// ============================================================================
// Registry Client
// ============================================================================

/// Discovery and health reporting against an external service registry
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Upsert this process's service entry together with its TTL check
    async fn register_self(&self, service_name: &str, port: u16) -> Result<(), RegistryError>;

    /// Update the TTL check attached to this process's service entry
    async fn report_health(
        &self,
        service_name: &str,
        status: HealthStatus,
        output: &str,
    ) -> Result<(), RegistryError>;

    /// Currently passing instances of `service_name`, as node identifiers
    ///
    /// Either the full set is returned or an error; never a partial set.
    async fn discover(&self, service_name: &str) -> Result<MembershipSet, RegistryError>;
}
