//! Observability infrastructure for the cost agent
//!
//! Provides:
//! - Prometheus metrics (build latency, usage collection latency, snapshot sizes)
//! - Structured JSON logging with tracing

use crate::models::Snapshot;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge, Gauge,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    build_latency_seconds: Histogram,
    usage_collection_latency_seconds: Histogram,
    snapshots_published: IntCounter,
    snapshot_failures: IntCounter,
    usage_collection_errors: IntCounter,
    namespaces: IntGauge,
    nodes: IntGauge,
    pods: IntGauge,
    cluster_node_hourly_cost: Gauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            build_latency_seconds: register_histogram!(
                "clustercost_agent_snapshot_build_latency_seconds",
                "Time spent aggregating a snapshot",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register snapshot_build_latency_seconds"),

            usage_collection_latency_seconds: register_histogram!(
                "clustercost_agent_usage_collection_latency_seconds",
                "Time spent fetching pod usage from the metrics API",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register usage_collection_latency_seconds"),

            snapshots_published: register_int_counter!(
                "clustercost_agent_snapshots_published_total",
                "Total number of snapshots published"
            )
            .expect("Failed to register snapshots_published_total"),

            snapshot_failures: register_int_counter!(
                "clustercost_agent_snapshot_failures_total",
                "Total number of snapshot refreshes abandoned"
            )
            .expect("Failed to register snapshot_failures_total"),

            usage_collection_errors: register_int_counter!(
                "clustercost_agent_usage_collection_errors_total",
                "Total number of failed pod usage collections"
            )
            .expect("Failed to register usage_collection_errors_total"),

            namespaces: register_int_gauge!(
                "clustercost_agent_namespaces",
                "Namespaces in the latest snapshot"
            )
            .expect("Failed to register namespaces"),

            nodes: register_int_gauge!("clustercost_agent_nodes", "Nodes in the latest snapshot")
                .expect("Failed to register nodes"),

            pods: register_int_gauge!(
                "clustercost_agent_pods",
                "Pods aggregated into the latest snapshot"
            )
            .expect("Failed to register pods"),

            cluster_node_hourly_cost: register_gauge!(
                "clustercost_agent_cluster_node_hourly_cost",
                "Summed hourly cost of all nodes in the latest snapshot"
            )
            .expect("Failed to register cluster_node_hourly_cost"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance. Clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    pub fn observe_build_latency(&self, duration_secs: f64) {
        self.inner().build_latency_seconds.observe(duration_secs);
    }

    pub fn observe_usage_collection_latency(&self, duration_secs: f64) {
        self.inner()
            .usage_collection_latency_seconds
            .observe(duration_secs);
    }

    /// Record a published snapshot and refresh the size gauges
    pub fn record_snapshot(&self, snapshot: &Snapshot) {
        let inner = self.inner();
        inner.snapshots_published.inc();
        inner.namespaces.set(snapshot.namespaces.len() as i64);
        inner.nodes.set(snapshot.nodes.len() as i64);
        inner.pods.set(i64::from(snapshot.pod_count()));
        inner
            .cluster_node_hourly_cost
            .set(snapshot.resources.total_node_hourly_cost);
    }

    pub fn inc_snapshot_failures(&self) {
        self.inner().snapshot_failures.inc();
    }

    pub fn inc_usage_collection_errors(&self) {
        self.inner().usage_collection_errors.inc();
    }
}

/// Structured logger for agent events
///
/// Every event carries a stable `event` field and the cluster identity.
#[derive(Clone)]
pub struct StructuredLogger {
    cluster_id: String,
}

impl StructuredLogger {
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
        }
    }

    pub fn log_startup(&self, version: &str, cluster_name: &str, region: &str) {
        info!(
            event = "agent_started",
            cluster_id = %self.cluster_id,
            cluster_name = %cluster_name,
            cluster_region = %region,
            cluster_type = "k8s",
            agent_version = %version,
            "ClusterCost agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            cluster_id = %self.cluster_id,
            reason = %reason,
            "ClusterCost agent shutting down"
        );
    }

    pub fn log_cache_synced(&self, elapsed_ms: u128) {
        info!(
            event = "cache_synced",
            cluster_id = %self.cluster_id,
            elapsed_ms = elapsed_ms,
            "Cluster object cache synced"
        );
    }

    pub fn log_snapshot_published(&self, snapshot: &Snapshot, elapsed_ms: u128) {
        info!(
            event = "snapshot_published",
            cluster_id = %self.cluster_id,
            namespaces = snapshot.namespaces.len(),
            nodes = snapshot.nodes.len(),
            pods = snapshot.pod_count(),
            total_node_hourly_cost = snapshot.resources.total_node_hourly_cost,
            elapsed_ms = elapsed_ms,
            "Published snapshot"
        );
    }

    /// Usage refresh failed; the snapshot is built from cached or fallback usage
    pub fn log_usage_degraded(&self, error: &str, cached_pods: usize) {
        warn!(
            event = "usage_degraded",
            cluster_id = %self.cluster_id,
            error = %error,
            cached_pods = cached_pods,
            "Using cached pod metrics"
        );
    }

    pub fn log_snapshot_failed(&self, error: &str) {
        warn!(
            event = "snapshot_failed",
            cluster_id = %self.cluster_id,
            error = %error,
            "Snapshot refresh failed, keeping previous snapshot"
        );
    }
}
