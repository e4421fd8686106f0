//! Tracing subscriber setup
//!
//! Hosts that do not install their own subscriber can call [`init_tracing`]
//! with the `logging` section of [`StrategyConfig`](crate::config::StrategyConfig).

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the env filter; `RUST_LOG` wins over the configured level
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid {} directives", EnvFilter::DEFAULT_ENV)),
        _ => EnvFilter::try_new(format!("roster={},warn", config.level))
            .with_context(|| format!("Invalid log level: {}", config.level)),
    }
}

/// Install a global tracing subscriber (text or json)
///
/// Fails instead of panicking when a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;

    match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(())
}
