//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use roster::membership::{ApplyFailure, ApplyOutcome, MembershipDriver, MembershipSet, NodeId};
use roster::registry::{HealthStatus, RegistryClient, RegistryError};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Build a membership set from short ids
pub fn set(ids: &[&str]) -> MembershipSet {
    ids.iter().map(|id| NodeId::from(*id)).collect()
}

/// One element of a Consul `/v1/health/service/<name>` response
pub fn health_entry(node: &str, address: &str, service: &str) -> Value {
    json!({
        "Node": {
            "ID": format!("{node}-id"),
            "Node": node,
            "Address": address,
            "Datacenter": "dc1",
            "TaggedAddresses": { "lan": address, "wan": address },
            "Meta": {}
        },
        "Service": {
            "ID": service,
            "Service": service,
            "Tags": [],
            "Address": "",
            "Port": 4369
        },
        "Checks": [{
            "Node": node,
            "CheckID": format!("{service}:erlang-node"),
            "Name": "Erlang Node Status",
            "Status": "passing",
            "Output": "node is running"
        }]
    })
}

// ============================================================================
// Fake Registry
// ============================================================================

/// Registry that replays scripted discovery results and records writes
///
/// Once the script runs out, `fallback` is returned for every discovery.
pub struct FakeRegistry {
    script: Mutex<VecDeque<Result<MembershipSet, RegistryError>>>,
    fallback: Mutex<MembershipSet>,
    pub registrations: Mutex<Vec<(String, u16)>>,
    pub reports: Mutex<Vec<(HealthStatus, String)>>,
    pub discoveries: Mutex<usize>,
}

impl FakeRegistry {
    pub fn new(fallback: MembershipSet) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            registrations: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
            discoveries: Mutex::new(0),
        }
    }

    pub fn scripted(results: Vec<Result<MembershipSet, RegistryError>>) -> Self {
        let registry = Self::new(MembershipSet::new());
        *registry.script.lock().unwrap() = results.into();
        registry
    }

    pub fn set_fallback(&self, members: MembershipSet) {
        *self.fallback.lock().unwrap() = members;
    }

    pub fn reports(&self) -> Vec<(HealthStatus, String)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn discoveries(&self) -> usize {
        *self.discoveries.lock().unwrap()
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn register_self(&self, service_name: &str, port: u16) -> Result<(), RegistryError> {
        self.registrations
            .lock()
            .unwrap()
            .push((service_name.to_string(), port));
        Ok(())
    }

    async fn report_health(
        &self,
        _service_name: &str,
        status: HealthStatus,
        output: &str,
    ) -> Result<(), RegistryError> {
        self.reports
            .lock()
            .unwrap()
            .push((status, output.to_string()));
        Ok(())
    }

    async fn discover(&self, _service_name: &str) -> Result<MembershipSet, RegistryError> {
        *self.discoveries.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }
}

// ============================================================================
// Scripted Driver
// ============================================================================

/// Driver whose failures are fixed per node and which records every call
#[derive(Default)]
pub struct ScriptedDriver {
    pub fail_connect: MembershipSet,
    pub fail_disconnect: MembershipSet,
    /// Extra failures reported for nodes that were never requested
    pub spurious: Vec<ApplyFailure>,
    pub connect_calls: Mutex<Vec<MembershipSet>>,
    pub disconnect_calls: Mutex<Vec<MembershipSet>>,
}

impl ScriptedDriver {
    pub fn failing(fail_connect: MembershipSet, fail_disconnect: MembershipSet) -> Self {
        Self {
            fail_connect,
            fail_disconnect,
            ..Default::default()
        }
    }

    fn outcome(&self, nodes: &MembershipSet, failing: &MembershipSet) -> ApplyOutcome {
        let mut failures: Vec<ApplyFailure> = nodes
            .iter()
            .filter(|node| failing.contains(node))
            .map(|node| ApplyFailure::new(node.clone(), "scripted failure"))
            .collect();
        failures.extend(self.spurious.iter().cloned());
        ApplyOutcome::from_failures(failures)
    }
}

#[async_trait]
impl MembershipDriver for ScriptedDriver {
    async fn connect_many(&self, nodes: &MembershipSet) -> ApplyOutcome {
        self.connect_calls.lock().unwrap().push(nodes.clone());
        self.outcome(nodes, &self.fail_connect)
    }

    async fn disconnect_many(&self, nodes: &MembershipSet) -> ApplyOutcome {
        self.disconnect_calls.lock().unwrap().push(nodes.clone());
        self.outcome(nodes, &self.fail_disconnect)
    }

    async fn list_connected(&self) -> MembershipSet {
        MembershipSet::new()
    }
}
