//! Core data models for the cost agent
//!
//! Every record here is created inside a single snapshot build and never
//! mutated after it is returned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Live usage sample for one pod, summed across its containers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodUsage {
    pub cpu_usage_milli: i64,
    pub memory_usage_bytes: i64,
}

/// Build the `"<namespace>/<pod>"` key used for usage lookups
pub fn pod_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Environment assigned to a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Nonprod,
    System,
    Unknown,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Nonprod => "nonprod",
            Environment::System => "system",
            Environment::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readiness of a node as reported by its `Ready` condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Ready,
    NotReady,
    Unknown,
}

/// Namespace-level cost and utilization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceCostRecord {
    pub cluster_id: String,
    pub namespace: String,
    pub hourly_cost: f64,
    pub pod_count: u32,
    pub cpu_request_milli: i64,
    pub memory_request_bytes: i64,
    pub cpu_usage_milli: i64,
    pub memory_usage_bytes: i64,
    pub labels: Option<BTreeMap<String, String>>,
    pub environment: Environment,
}

/// Node pricing and utilization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCostRecord {
    pub cluster_id: String,
    pub node_name: String,
    pub hourly_cost: f64,
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub cpu_allocatable_milli: i64,
    pub memory_allocatable_bytes: i64,
    pub pod_count: u32,
    pub status: NodeStatus,
    pub is_under_pressure: bool,
    pub instance_type: String,
    pub labels: Option<BTreeMap<String, String>>,
    pub taints: Option<Vec<String>>,
}

/// Cluster-wide totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    pub cluster_id: String,
    pub cpu_usage_milli_total: i64,
    pub cpu_request_milli_total: i64,
    pub memory_usage_bytes_total: i64,
    pub memory_request_bytes_total: i64,
    pub total_node_hourly_cost: f64,
}

/// Point-in-time view of namespace, node and cluster costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub namespaces: Vec<NamespaceCostRecord>,
    pub nodes: Vec<NodeCostRecord>,
    pub resources: ResourceSnapshot,
    /// Opaque network summary attached by an external producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<serde_json::Value>,
}

impl Snapshot {
    /// Attach a network summary without touching any other field
    pub fn with_network(mut self, network: Option<serde_json::Value>) -> Self {
        self.network = network;
        self
    }

    /// Number of pods that contributed to this snapshot
    pub fn pod_count(&self) -> u32 {
        self.namespaces.iter().map(|ns| ns.pod_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_serializes_lowercase() {
        let json = serde_json::to_string(&Environment::Nonprod).unwrap();
        assert_eq!(json, "\"nonprod\"");
        assert_eq!(Environment::Production.to_string(), "production");
    }

    #[test]
    fn test_record_uses_camel_case_fields() {
        let record = ResourceSnapshot {
            cluster_id: "c1".to_string(),
            cpu_request_milli_total: 750,
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["clusterId"], "c1");
        assert_eq!(value["cpuRequestMilliTotal"], 750);
    }

    #[test]
    fn test_pod_key() {
        assert_eq!(pod_key("default", "pod-a"), "default/pod-a");
    }
}
