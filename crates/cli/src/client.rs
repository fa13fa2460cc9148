//! API client for the ClusterCost agent HTTP API

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

pub const HEALTH_PATH: &str = "agent/v1/health";
pub const NAMESPACES_PATH: &str = "agent/v1/namespaces";
pub const NODES_PATH: &str = "agent/v1/nodes";
pub const RESOURCES_PATH: &str = "agent/v1/resources";

/// API client for a single agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn health(&self) -> Result<AgentHealth> {
        self.get(HEALTH_PATH).await
    }

    pub async fn namespaces(&self) -> Result<NamespaceList> {
        self.get(NAMESPACES_PATH).await
    }

    pub async fn nodes(&self) -> Result<NodeList> {
        self.get(NODES_PATH).await
    }

    pub async fn resources(&self) -> Result<ResourceTotals> {
        self.get(RESOURCES_PATH).await
    }
}

// API response types

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHealth {
    pub status: String,
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub cluster_type: String,
    #[serde(default)]
    pub cluster_region: String,
    #[serde(default)]
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceCost {
    pub cluster_id: String,
    pub namespace: String,
    pub hourly_cost: f64,
    pub pod_count: u32,
    pub cpu_request_milli: i64,
    pub memory_request_bytes: i64,
    pub cpu_usage_milli: i64,
    pub memory_usage_bytes: i64,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCost {
    pub cluster_id: String,
    pub node_name: String,
    pub hourly_cost: f64,
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub cpu_allocatable_milli: i64,
    pub memory_allocatable_bytes: i64,
    pub pod_count: u32,
    pub status: String,
    pub is_under_pressure: bool,
    pub instance_type: String,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub taints: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResources {
    pub cluster_id: String,
    pub cpu_usage_milli_total: i64,
    pub cpu_request_milli_total: i64,
    pub memory_usage_bytes_total: i64,
    pub memory_request_bytes_total: i64,
    pub total_node_hourly_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceList {
    pub items: Vec<NamespaceCost>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeList {
    pub items: Vec<NodeCost>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTotals {
    pub snapshot: ClusterResources,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_namespaces_parses_agent_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/agent/v1/namespaces")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"items":[{"clusterId":"c1","namespace":"payments","hourlyCost":0.025,
                "podCount":1,"cpuRequestMilli":500,"memoryRequestBytes":1073741824,
                "cpuUsageMilli":400,"memoryUsageBytes":838860800,"labels":null,
                "environment":"production"}],"timestamp":"2024-05-01T12:00:00.000000000Z"}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let list = client.namespaces().await.unwrap();

        mock.assert_async().await;
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].namespace, "payments");
        assert_eq!(list.items[0].environment, "production");
        assert!(list.items[0].labels.is_none());
    }

    #[tokio::test]
    async fn test_not_ready_surfaces_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/agent/v1/nodes")
            .with_status(503)
            .with_body(r#"{"error":"snapshot not ready"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.nodes().await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("snapshot not ready"));
    }

    #[tokio::test]
    async fn test_health_tolerates_missing_optional_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/agent/v1/health")
            .with_status(200)
            .with_body(r#"{"status":"initializing","clusterId":"c1","timestamp":"2024-05-01T12:00:00Z"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();

        assert_eq!(health.status, "initializing");
        assert!(health.cluster_region.is_empty());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
