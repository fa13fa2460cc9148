//! Snapshot aggregation
//!
//! Joins cached cluster objects with live usage and prices into namespace,
//! node and cluster records. Building is a pure function of its inputs.

use crate::classifier::EnvironmentClassifier;
use crate::collector::UsageMap;
use crate::models::{
    pod_key, NamespaceCostRecord, NodeCostRecord, NodeStatus, PodUsage, ResourceSnapshot,
    Snapshot,
};
use crate::pricing::{price_or_zero, NodePriceLookup};
use crate::quantity::{cpu_milli_of, memory_bytes_of};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{
    Namespace, Node, NodeCondition, Pod, ResourceRequirements, Taint,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Node labels that carry the instance type, in priority order
pub const INSTANCE_TYPE_LABELS: &[&str] = &[
    "node.kubernetes.io/instance-type",
    "beta.kubernetes.io/instance-type",
    "node.k8s.amazonaws.com/instance-type",
];

const PRESSURE_CONDITIONS: &[&str] = &["DiskPressure", "MemoryPressure", "PIDPressure"];

/// Builds snapshots for one cluster
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    cluster_id: String,
    classifier: EnvironmentClassifier,
    prices: Option<NodePriceLookup>,
}

/// Node record plus the running totals of pods placed on it
struct NodeAggregate {
    record: NodeCostRecord,
    pod_count: u32,
    cpu_usage_milli: i64,
    memory_usage_bytes: i64,
}

impl SnapshotBuilder {
    pub fn new(
        cluster_id: impl Into<String>,
        classifier: EnvironmentClassifier,
        prices: impl Into<Option<NodePriceLookup>>,
    ) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            classifier,
            prices: prices.into(),
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Assemble a snapshot from cached objects and usage.
    ///
    /// Records are keyed by name in ordered maps, so both output lists come
    /// out sorted by name regardless of input order.
    pub fn build(
        &self,
        nodes: &[Arc<Node>],
        namespaces: &[Arc<Namespace>],
        pods: &[Arc<Pod>],
        usage: &UsageMap,
        generated_at: DateTime<Utc>,
    ) -> Snapshot {
        let mut ns_records: BTreeMap<String, NamespaceCostRecord> = BTreeMap::new();
        for ns in namespaces {
            let name = ns.metadata.name.clone().unwrap_or_default();
            let labels = ns.metadata.labels.as_ref();
            let record = NamespaceCostRecord {
                cluster_id: self.cluster_id.clone(),
                namespace: name.clone(),
                hourly_cost: 0.0,
                pod_count: 0,
                cpu_request_milli: 0,
                memory_request_bytes: 0,
                cpu_usage_milli: 0,
                memory_usage_bytes: 0,
                labels: clone_labels(labels),
                environment: self.classifier.classify(&name, labels),
            };
            ns_records.insert(name, record);
        }

        let mut node_records: BTreeMap<String, NodeAggregate> = BTreeMap::new();
        let mut total_node_cost = 0.0;
        for node in nodes {
            let record = self.node_record(node);
            total_node_cost += record.hourly_cost;
            node_records.insert(
                record.node_name.clone(),
                NodeAggregate {
                    record,
                    pod_count: 0,
                    cpu_usage_milli: 0,
                    memory_usage_bytes: 0,
                },
            );
        }

        let mut totals = ResourceSnapshot {
            cluster_id: self.cluster_id.clone(),
            total_node_hourly_cost: total_node_cost,
            ..Default::default()
        };

        for pod in pods {
            let Some(node_name) = eligible_node(pod) else {
                continue;
            };
            let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
            let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();

            let ns = ns_records
                .entry(namespace.to_string())
                .or_insert_with(|| NamespaceCostRecord {
                    cluster_id: self.cluster_id.clone(),
                    namespace: namespace.to_string(),
                    hourly_cost: 0.0,
                    pod_count: 0,
                    cpu_request_milli: 0,
                    memory_request_bytes: 0,
                    cpu_usage_milli: 0,
                    memory_usage_bytes: 0,
                    // No namespace object to copy from; serialized as `{}`
                    labels: Some(BTreeMap::new()),
                    environment: self.classifier.classify(namespace, None),
                });
            ns.pod_count += 1;

            let (cpu_request, memory_request) = sum_pod_requests(pod);
            let measured = usage
                .get(&pod_key(namespace, pod_name))
                .copied()
                .unwrap_or_default();
            let PodUsage {
                cpu_usage_milli: cpu_usage,
                memory_usage_bytes: memory_usage,
            } = usage_or_requests(measured, cpu_request, memory_request);

            ns.cpu_request_milli += cpu_request;
            ns.memory_request_bytes += memory_request;
            ns.cpu_usage_milli += cpu_usage;
            ns.memory_usage_bytes += memory_usage;

            totals.cpu_request_milli_total += cpu_request;
            totals.memory_request_bytes_total += memory_request;
            totals.cpu_usage_milli_total += cpu_usage;
            totals.memory_usage_bytes_total += memory_usage;

            if let Some(agg) = node_records.get_mut(node_name) {
                agg.pod_count += 1;
                agg.cpu_usage_milli += cpu_usage;
                agg.memory_usage_bytes += memory_usage;
                ns.hourly_cost += cost_share(
                    cpu_request,
                    agg.record.cpu_allocatable_milli,
                    agg.record.hourly_cost,
                );
            }
        }

        let nodes_out = node_records
            .into_values()
            .map(|mut agg| {
                agg.record.cpu_usage_percent =
                    usage_percent(agg.cpu_usage_milli, agg.record.cpu_allocatable_milli);
                agg.record.memory_usage_percent =
                    usage_percent(agg.memory_usage_bytes, agg.record.memory_allocatable_bytes);
                agg.record.pod_count = agg.pod_count;
                agg.record
            })
            .collect();

        Snapshot {
            timestamp: generated_at,
            namespaces: ns_records.into_values().collect(),
            nodes: nodes_out,
            resources: totals,
            network: None,
        }
    }

    fn node_record(&self, node: &Node) -> NodeCostRecord {
        let allocatable = node.status.as_ref().and_then(|s| s.allocatable.as_ref());
        let conditions = node
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_deref())
            .unwrap_or_default();
        let labels = node.metadata.labels.as_ref();
        let instance_type = detect_instance_type(labels);

        NodeCostRecord {
            cluster_id: self.cluster_id.clone(),
            node_name: node.metadata.name.clone().unwrap_or_default(),
            hourly_cost: price_or_zero(self.prices.as_ref(), &instance_type),
            cpu_usage_percent: 0.0,
            memory_usage_percent: 0.0,
            cpu_allocatable_milli: cpu_milli_of(allocatable),
            memory_allocatable_bytes: memory_bytes_of(allocatable),
            pod_count: 0,
            status: node_status(conditions),
            is_under_pressure: node_under_pressure(conditions),
            instance_type,
            labels: clone_labels(labels),
            taints: format_taints(node.spec.as_ref().and_then(|s| s.taints.as_deref())),
        }
    }
}

/// Node name of a pod that should be aggregated, or `None` if it is skipped:
/// unnamed, unscheduled, terminating, or in a terminal phase.
pub fn eligible_node(pod: &Pod) -> Option<&str> {
    if pod.metadata.name.as_deref().unwrap_or_default().is_empty() {
        return None;
    }
    if pod.metadata.deletion_timestamp.is_some() {
        return None;
    }
    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    if matches!(phase, Some("Succeeded") | Some("Failed")) {
        return None;
    }
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .filter(|n| !n.is_empty())
}

/// CPU milli-cores and memory bytes requested across init, ephemeral and
/// regular containers
pub fn sum_pod_requests(pod: &Pod) -> (i64, i64) {
    let Some(spec) = pod.spec.as_ref() else {
        return (0, 0);
    };

    let regular = spec.containers.iter().map(|c| c.resources.as_ref());
    let init = spec
        .init_containers
        .iter()
        .flatten()
        .map(|c| c.resources.as_ref());
    let ephemeral = spec
        .ephemeral_containers
        .iter()
        .flatten()
        .map(|c| c.resources.as_ref());

    regular
        .chain(init)
        .chain(ephemeral)
        .fold((0, 0), |(cpu, mem), resources| {
            let requests = resources.and_then(|r: &ResourceRequirements| r.requests.as_ref());
            (cpu + cpu_milli_of(requests), mem + memory_bytes_of(requests))
        })
}

/// Measured usage, with each zero resource replaced by its request
pub fn usage_or_requests(measured: PodUsage, cpu_request: i64, memory_request: i64) -> PodUsage {
    PodUsage {
        cpu_usage_milli: if measured.cpu_usage_milli == 0 {
            cpu_request
        } else {
            measured.cpu_usage_milli
        },
        memory_usage_bytes: if measured.memory_usage_bytes == 0 {
            memory_request
        } else {
            measured.memory_usage_bytes
        },
    }
}

/// Portion of a node's hourly cost attributed to one pod by CPU request.
/// The share is capped at the whole node per pod.
pub fn cost_share(
    cpu_request_milli: i64,
    node_cpu_allocatable_milli: i64,
    node_hourly_cost: f64,
) -> f64 {
    if node_cpu_allocatable_milli <= 0 || node_hourly_cost <= 0.0 || cpu_request_milli <= 0 {
        return 0.0;
    }
    let share = (cpu_request_milli as f64 / node_cpu_allocatable_milli as f64).min(1.0);
    share * node_hourly_cost
}

/// `used / allocatable` as a percentage clamped to `[0, 100]`; zero when
/// nothing is allocatable
pub fn usage_percent(used: i64, allocatable: i64) -> f64 {
    if allocatable <= 0 {
        return 0.0;
    }
    (used as f64 / allocatable as f64 * 100.0).clamp(0.0, 100.0)
}

/// First non-empty instance type label, or an empty string
pub fn detect_instance_type(labels: Option<&BTreeMap<String, String>>) -> String {
    let Some(labels) = labels else {
        return String::new();
    };
    INSTANCE_TYPE_LABELS
        .iter()
        .filter_map(|key| labels.get(*key))
        .find(|v| !v.is_empty())
        .cloned()
        .unwrap_or_default()
}

pub fn node_status(conditions: &[NodeCondition]) -> NodeStatus {
    match conditions.iter().find(|c| c.type_ == "Ready") {
        Some(c) if c.status == "True" => NodeStatus::Ready,
        Some(_) => NodeStatus::NotReady,
        None => NodeStatus::Unknown,
    }
}

pub fn node_under_pressure(conditions: &[NodeCondition]) -> bool {
    conditions
        .iter()
        .any(|c| PRESSURE_CONDITIONS.contains(&c.type_.as_str()) && c.status == "True")
}

/// Taints as sorted `key=value:Effect` strings (`key:Effect` without a value)
pub fn format_taints(taints: Option<&[Taint]>) -> Option<Vec<String>> {
    let taints = taints.filter(|t| !t.is_empty())?;
    let mut out: Vec<String> = taints
        .iter()
        .map(|t| match t.value.as_deref() {
            Some(value) if !value.is_empty() => format!("{}={}:{}", t.key, value, t.effect),
            _ => format!("{}:{}", t.key, t.effect),
        })
        .collect();
    out.sort();
    Some(out)
}

fn clone_labels(labels: Option<&BTreeMap<String, String>>) -> Option<BTreeMap<String, String>> {
    labels.filter(|l| !l.is_empty()).cloned()
}
