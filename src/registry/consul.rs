//! Consul agent client
//!
//! Implements [`RegistryClient`] over the Consul HTTP API. Every call is a
//! single attempt bounded by the configured request timeout; retrying is left
//! to the next reconciliation cycle or heartbeat tick.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use url::Url;

use crate::config::{CheckConfig, StrategyConfig};
use crate::membership::{MembershipSet, NodeId};

use super::types::{CheckDefinition, CheckUpdate, ServiceEntry, ServiceRegistration};
use super::{HealthStatus, RegistryClient, RegistryError};

/// HTTP client for a Consul-compatible agent
#[derive(Debug, Clone)]
pub struct ConsulClient {
    http_client: Client,
    root: Url,
    node_basename: String,
    local_node: Option<NodeId>,
    check: CheckConfig,
}

impl ConsulClient {
    /// Create a client from strategy configuration
    pub fn new(config: &StrategyConfig) -> Result<Self, RegistryError> {
        let root = Url::parse(&config.root)
            .map_err(|e| RegistryError::Init(format!("Invalid registry root '{}': {e}", config.root)))?;

        if root.cannot_be_a_base() {
            return Err(RegistryError::Init(format!(
                "Registry root '{}' cannot be used as a base URL",
                config.root
            )));
        }

        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("roster/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RegistryError::Init(e.to_string()))?;

        Ok(Self {
            http_client,
            root,
            node_basename: config.node_basename().to_string(),
            local_node: config.local_node(),
            check: config.check.clone(),
        })
    }

    /// Registry base URL
    pub fn root(&self) -> &Url {
        &self.root
    }

    fn check_id(&self, service_name: &str) -> String {
        format!("{}:{}", service_name, self.check.id_suffix)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.root.clone();
        // cannot_be_a_base was rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn put_json<T: Serialize>(&self, url: Url, body: &T) -> Result<(), RegistryError> {
        tracing::debug!(url = %url, "PUT registry");
        let response = self.http_client.put(url).json(body).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RegistryError::Http {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl RegistryClient for ConsulClient {
    async fn register_self(&self, service_name: &str, port: u16) -> Result<(), RegistryError> {
        let body = ServiceRegistration {
            name: service_name.to_string(),
            port,
            checks: vec![CheckDefinition {
                check_id: self.check_id(service_name),
                name: self.check.name.clone(),
                ttl: self.check.ttl(),
            }],
        };

        let url = self.endpoint(&["v1", "agent", "service", "register"]);
        self.put_json(url, &body).await
    }

    async fn report_health(
        &self,
        service_name: &str,
        status: HealthStatus,
        output: &str,
    ) -> Result<(), RegistryError> {
        let body = CheckUpdate {
            status,
            output: output.to_string(),
        };

        let check_id = self.check_id(service_name);
        let url = self.endpoint(&["v1", "agent", "check", "update", &check_id]);
        self.put_json(url, &body).await
    }

    async fn discover(&self, service_name: &str) -> Result<MembershipSet, RegistryError> {
        let mut url = self.endpoint(&["v1", "health", "service", service_name]);
        url.query_pairs_mut().append_pair("passing", "true");

        tracing::debug!(url = %url, "GET registry");
        let response = ensure_success(self.http_client.get(url).send().await?).await?;

        let body = response.text().await?;
        let entries: Vec<ServiceEntry> = serde_json::from_str(&body)
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;

        let mut members = MembershipSet::new();
        for entry in entries {
            let address = entry.node.address.trim();
            if address.is_empty() {
                return Err(RegistryError::InvalidResponse(format!(
                    "Instance on node {} has no address",
                    entry.node.node.as_deref().unwrap_or("<unknown>")
                )));
            }

            let id = NodeId::from_parts(&self.node_basename, address);
            if self.local_node.as_ref() != Some(&id) {
                members.insert(id);
            }
        }

        Ok(members)
    }
}
