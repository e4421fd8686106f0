//! Wire payloads for the Consul agent and health APIs

use serde::{Deserialize, Serialize};

use super::HealthStatus;

/// Body of `PUT /v1/agent/service/register`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRegistration {
    pub name: String,
    pub port: u16,
    pub checks: Vec<CheckDefinition>,
}

/// TTL check attached to a service registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckDefinition {
    #[serde(rename = "CheckId")]
    pub check_id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "TTL")]
    pub ttl: String,
}

/// Body of `PUT /v1/agent/check/update/<check-id>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckUpdate {
    pub status: HealthStatus,
    pub output: String,
}

/// One element of `GET /v1/health/service/<name>`
///
/// Only the fields the client reads are modelled; the rest are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceEntry {
    pub node: CatalogNode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogNode {
    #[serde(default)]
    pub node: Option<String>,

    pub address: String,
}
