//! Reconciliation scenario tests
//!
//! Drives single cycles against a scripted registry and checks the committed
//! membership for:
//! 1. Full convergence
//! 2. Failed disconnects staying tracked
//! 3. Failed connects being dropped
//! 4. Discovery failures leaving membership untouched
//! 5. Idempotence of repeated cycles

use roster::error::ErrorCategory;
use roster::membership::{ApplyFailure, InMemoryDriver, MembershipDriver, MembershipSet, NodeId};
use roster::reconciler::{CycleReport, Reconciler};
use roster::registry::RegistryError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::common::{set, FakeRegistry, ScriptedDriver};

fn reconciler(
    registry: Arc<FakeRegistry>,
    driver: Arc<dyn MembershipDriver>,
    tracked: MembershipSet,
) -> Reconciler {
    Reconciler::new("ledger", registry, driver, Duration::from_millis(10)).with_tracked(tracked)
}

// ============================================================================
// Convergence
// ============================================================================

#[tokio::test]
async fn test_converges_when_driver_succeeds() {
    let registry = Arc::new(FakeRegistry::new(set(&["b", "c"])));
    let driver = Arc::new(ScriptedDriver::default());
    let mut r = reconciler(registry, driver.clone(), set(&["a", "b"]));

    let report = r.run_cycle().await;

    assert_eq!(r.tracked(), &set(&["b", "c"]));
    let summary = report.summary().unwrap();
    assert_eq!(summary.added, set(&["c"]));
    assert_eq!(summary.removed, set(&["a"]));
    assert_eq!(summary.tracked, 2);

    assert_eq!(*driver.disconnect_calls.lock().unwrap(), vec![set(&["a"])]);
    assert_eq!(*driver.connect_calls.lock().unwrap(), vec![set(&["c"])]);
}

#[tokio::test]
async fn test_first_cycle_connects_everything() {
    let registry = Arc::new(FakeRegistry::new(set(&["a", "b", "c"])));
    let driver = InMemoryDriver::new();
    let mut r = reconciler(registry, Arc::new(driver.clone()), MembershipSet::new());

    r.run_cycle().await;

    assert_eq!(r.tracked(), &set(&["a", "b", "c"]));
    assert_eq!(driver.list_connected().await, set(&["a", "b", "c"]));
}

#[tokio::test]
async fn test_empty_discovery_disconnects_everyone() {
    let registry = Arc::new(FakeRegistry::new(MembershipSet::new()));
    let driver = Arc::new(ScriptedDriver::default());
    let mut r = reconciler(registry, driver.clone(), set(&["a", "b"]));

    r.run_cycle().await;

    assert!(r.tracked().is_empty());
    assert!(driver.connect_calls.lock().unwrap().is_empty());
}

// ============================================================================
// Partial Failures
// ============================================================================

#[tokio::test]
async fn test_failed_disconnect_stays_tracked() {
    let registry = Arc::new(FakeRegistry::new(set(&["b", "c"])));
    let driver = Arc::new(ScriptedDriver::failing(MembershipSet::new(), set(&["a"])));
    let mut r = reconciler(registry, driver, set(&["a", "b"]));

    let report = r.run_cycle().await;

    assert_eq!(r.tracked(), &set(&["a", "b", "c"]));
    let summary = report.summary().unwrap();
    assert!(summary.removed.is_empty());
    assert_eq!(summary.added, set(&["c"]));
    assert_eq!(summary.failed_disconnects.len(), 1);
    assert_eq!(summary.failed_disconnects[0].node, NodeId::from("a"));
}

#[tokio::test]
async fn test_failed_connect_is_dropped() {
    let registry = Arc::new(FakeRegistry::new(set(&["a", "d"])));
    let driver = Arc::new(ScriptedDriver::failing(set(&["d"]), MembershipSet::new()));
    let mut r = reconciler(registry, driver, set(&["a"]));

    let report = r.run_cycle().await;

    assert_eq!(r.tracked(), &set(&["a"]));
    let summary = report.summary().unwrap();
    assert!(summary.added.is_empty());
    assert_eq!(summary.failed_connects.len(), 1);
}

#[tokio::test]
async fn test_failed_node_is_retried_next_cycle() {
    let registry = Arc::new(FakeRegistry::new(set(&["a", "d"])));
    let driver = InMemoryDriver::new();
    driver.refuse_connect(NodeId::from("d"), "connection refused").await;
    let mut r = reconciler(registry, Arc::new(driver.clone()), set(&["a"]));

    r.run_cycle().await;
    assert_eq!(r.tracked(), &set(&["a"]));

    driver.clear_refusals().await;
    r.run_cycle().await;
    assert_eq!(r.tracked(), &set(&["a", "d"]));
}

#[tokio::test]
async fn test_failures_for_unrequested_nodes_are_ignored() {
    let registry = Arc::new(FakeRegistry::new(set(&["b", "c"])));
    let driver = Arc::new(ScriptedDriver {
        spurious: vec![
            ApplyFailure::new(NodeId::from("b"), "not requested"),
            ApplyFailure::new(NodeId::from("z"), "unknown node"),
        ],
        ..Default::default()
    });
    let mut r = reconciler(registry, driver, set(&["a", "b"]));

    let report = r.run_cycle().await;

    assert_eq!(r.tracked(), &set(&["b", "c"]));
    let summary = report.summary().unwrap();
    assert!(summary.failed_connects.is_empty());
    assert!(summary.failed_disconnects.is_empty());
}

// ============================================================================
// Discovery Failures
// ============================================================================

#[tokio::test]
async fn test_malformed_response_keeps_membership() {
    let registry = Arc::new(FakeRegistry::scripted(vec![Err(RegistryError::InvalidResponse(
        "truncated body".to_string(),
    ))]));
    let driver = Arc::new(ScriptedDriver::default());
    let mut r = reconciler(registry, driver.clone(), set(&["a", "b"]));

    let report = r.run_cycle().await;

    assert!(report.is_discovery_failure());
    assert_eq!(r.tracked(), &set(&["a", "b"]));
    assert!(driver.connect_calls.lock().unwrap().is_empty());
    assert!(driver.disconnect_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_discovery_failure_reports_category() {
    let registry = Arc::new(FakeRegistry::scripted(vec![Err(RegistryError::Http {
        status: 503,
        message: "No cluster leader".to_string(),
    })]));
    let mut r = reconciler(registry, Arc::new(ScriptedDriver::default()), set(&["a"]));

    match r.run_cycle().await {
        CycleReport::DiscoveryFailed { reason, category } => {
            assert!(reason.contains("503"));
            assert_eq!(category, ErrorCategory::Registry);
        }
        other => panic!("Expected discovery failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_loop_recovers_after_discovery_failure() {
    let registry = Arc::new(FakeRegistry::scripted(vec![
        Err(RegistryError::InvalidResponse("empty body".to_string())),
        Err(RegistryError::InvalidResponse("empty body".to_string())),
    ]));
    registry.set_fallback(set(&["b"]));

    let r = reconciler(registry.clone(), Arc::new(ScriptedDriver::default()), set(&["a"]));
    let mut updates = r.subscribe();
    let (tx, rx) = watch::channel(None);
    let handle = tokio::spawn(r.run(rx));

    let converged = tokio::time::timeout(
        Duration::from_secs(2),
        updates.wait_for(|tracked| *tracked == set(&["b"])),
    )
    .await
    .map(|seen| seen.is_ok())
    .unwrap_or(false);
    assert!(converged, "Reconciler should converge after outage");

    tx.send_replace(Some("done".to_string()));
    let tracked = handle.await.unwrap();

    assert_eq!(tracked, set(&["b"]));
    assert!(registry.discoveries() >= 3);
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_second_cycle_is_noop() {
    let registry = Arc::new(FakeRegistry::new(set(&["b", "c"])));
    let driver = Arc::new(ScriptedDriver::default());
    let mut r = reconciler(registry, driver.clone(), set(&["a", "b"]));

    r.run_cycle().await;
    let after_first = r.tracked().clone();
    let report = r.run_cycle().await;

    assert_eq!(r.tracked(), &after_first);
    assert!(report.summary().unwrap().is_noop());
    // Empty deltas never reach the driver
    assert_eq!(driver.connect_calls.lock().unwrap().len(), 1);
    assert_eq!(driver.disconnect_calls.lock().unwrap().len(), 1);
}
