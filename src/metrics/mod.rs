//! Prometheus metrics for membership reconciliation
//!
//! This module provides metrics tracking for:
//! - Reconciler: cycles, discovery failures, per-action apply failures,
//!   tracked membership size, cycle duration
//! - Heartbeat: reports sent per status, failed reports
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails or never happens, metrics operations are no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all reconciler and heartbeat metrics
struct RosterMetrics {
    reconcile_cycles: Counter,
    discovery_failures: Counter,
    apply_failures: CounterVec,
    tracked_members: Gauge,
    reconcile_duration: Histogram,
    heartbeats: CounterVec,
    heartbeat_failures: Counter,
}

static METRICS: OnceLock<RosterMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Register all Prometheus metrics with the default registry
///
/// Safe to call more than once; only the first call registers anything.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = roster::metrics::init_metrics() {
///     tracing::warn!("Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = RosterMetrics {
        reconcile_cycles: register_counter!(
            "roster_reconcile_cycles_total",
            "Total reconciliation cycles run"
        )?,
        discovery_failures: register_counter!(
            "roster_discovery_failures_total",
            "Total reconciliation cycles aborted by a discovery failure"
        )?,
        apply_failures: register_counter_vec!(
            "roster_apply_failures_total",
            "Total nodes the membership driver failed to connect or disconnect",
            &["action"]
        )?,
        tracked_members: register_gauge!(
            "roster_tracked_members",
            "Number of peers in the committed membership set"
        )?,
        reconcile_duration: register_histogram!(
            "roster_reconcile_duration_seconds",
            "Reconciliation cycle duration in seconds",
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
        )?,
        heartbeats: register_counter_vec!(
            "roster_heartbeats_total",
            "Total health reports sent to the registry",
            &["status"]
        )?,
        heartbeat_failures: register_counter!(
            "roster_heartbeat_failures_total",
            "Total health reports the registry did not accept"
        )?,
    };

    METRICS
        .set(metrics)
        .map_err(|_| "Roster metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a finished reconciliation cycle
pub fn record_cycle(tracked: usize, duration_secs: f64) {
    let Some(m) = METRICS.get() else {
        return;
    };

    m.reconcile_cycles.inc();
    m.tracked_members.set(tracked as f64);
    m.reconcile_duration.observe(duration_secs);
}

/// Record a cycle aborted by discovery failure
pub fn record_discovery_failure() {
    if let Some(m) = METRICS.get() {
        m.reconcile_cycles.inc();
        m.discovery_failures.inc();
    }
}

/// Record nodes the driver failed to apply
pub fn record_apply_failures(action: &str, count: usize) {
    if count == 0 {
        return;
    }

    if let Some(m) = METRICS.get() {
        m.apply_failures
            .with_label_values(&[action])
            .inc_by(count as f64);
    }
}

/// Record a health report
pub fn record_heartbeat(status: &str, accepted: bool) {
    let Some(m) = METRICS.get() else {
        return;
    };

    m.heartbeats.with_label_values(&[status]).inc();
    if !accepted {
        m.heartbeat_failures.inc();
    }
}
