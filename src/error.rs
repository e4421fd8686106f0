//! Unified error handling for the roster crate
//!
//! This module provides a unified error type that consolidates the
//! domain-specific errors into a single `Error` enum, while keeping the
//! domain errors usable on their own.
//!
//! # Architecture
//!
//! - [`RosterErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! None of the registry or membership errors is fatal: a failed cycle leaves
//! the tracked membership untouched and the next cycle retries. Only
//! configuration errors stop a strategy from starting.

use thiserror::Error;

use crate::membership::ApplyFailure;

pub use crate::config::ConfigError;
pub use crate::registry::RegistryError;

/// Common trait for all roster error types
pub trait RosterErrorTrait: std::error::Error {
    /// Check if this error is recoverable (a later cycle may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Registry unreachable or timed out
    Transport,
    /// Registry reachable but answered with an error or garbage
    Registry,
    /// Membership driver could not apply part of a delta
    Membership,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Registry => "registry",
            Self::Membership => "membership",
            Self::Config => "config",
        }
    }
}

/// Which side of a delta an apply failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyAction {
    Connect,
    Disconnect,
}

impl ApplyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }
}

impl std::fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the roster crate
#[derive(Error, Debug)]
pub enum Error {
    /// Registry call errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Driver failed to connect or disconnect some nodes
    #[error("Failed to {action} {} node(s)", .failures.len())]
    PartialApply {
        action: ApplyAction,
        failures: Vec<ApplyFailure>,
    },
}

impl RosterErrorTrait for RegistryError {
    fn is_recoverable(&self) -> bool {
        RegistryError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            RegistryError::Transport(_) => ErrorCategory::Transport,
            RegistryError::Http { .. } | RegistryError::InvalidResponse(_) => {
                ErrorCategory::Registry
            }
            RegistryError::Init(_) => ErrorCategory::Config,
        }
    }
}

impl RosterErrorTrait for ConfigError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Config
    }
}

impl RosterErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Registry(e) => RosterErrorTrait::is_recoverable(e),
            Self::Config(e) => e.is_recoverable(),
            Self::PartialApply { .. } => true,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Registry(e) => e.category(),
            Self::Config(e) => e.category(),
            Self::PartialApply { .. } => ErrorCategory::Membership,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
