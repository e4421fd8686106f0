//! Test fixtures for integration tests
//!
//! Provides mock Consul endpoints and helpers for inspecting what the agent
//! sent to them.

use roster::config::StrategyConfig;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::health_entry;

pub const SERVICE: &str = "ledger";
pub const CHECK_UPDATE_PATH: &str = "/v1/agent/check/update/ledger:erlang-node";

/// Addresses of the peers a healthy mock registry advertises
pub const PEER_ADDRESSES: &[&str] = &["10.0.3.18", "10.0.3.19"];

/// Agent configuration pointed at `server` with fast timers
pub fn fast_config(server: &MockServer) -> StrategyConfig {
    StrategyConfig::builder()
        .service_name(SERVICE)
        .service_port(4369)
        .root(server.uri())
        .polling_interval_ms(20)
        .heartbeat_interval_ms(20)
        .request_timeout_ms(200)
        .local_address("10.0.3.17")
        .build()
        .unwrap()
}

/// Health response listing this node plus `peers`
pub fn health_body(peers: &[&str]) -> Value {
    let mut entries = vec![health_entry("self", "10.0.3.17", SERVICE)];
    for (i, address) in peers.iter().enumerate() {
        entries.push(health_entry(&format!("host-{i}"), address, SERVICE));
    }
    Value::Array(entries)
}

/// Accept registration and every check update
pub async fn mount_agent_endpoints(server: &MockServer) {
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/register"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/v1/agent/check/update/.+$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Serve `peers` from the health endpoint
pub async fn mount_discovery(server: &MockServer, peers: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/health/service/{SERVICE}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_body(peers)))
        .mount(server)
        .await;
}

/// Bodies of every check update received, in order
pub async fn check_updates(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|req| req.method.as_str() == "PUT" && req.url.path() == CHECK_UPDATE_PATH)
        .filter_map(|req| serde_json::from_slice(&req.body).ok())
        .collect()
}

/// Number of requests received on `request_path`
pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|req| req.url.path() == request_path)
        .count()
}

pub fn passing() -> Value {
    json!({ "Status": "passing", "Output": "node is running" })
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
