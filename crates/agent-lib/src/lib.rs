//! Agent library for Kubernetes cost snapshots
//!
//! This crate provides the core functionality for:
//! - Mirroring nodes, namespaces and pods from the cluster
//! - Collecting live pod usage with stale-cache fallback
//! - Pricing nodes and classifying namespace environments
//! - Aggregating namespace, node and cluster cost snapshots
//! - Serving snapshots, health checks and observability over HTTP

pub mod api;
pub mod classifier;
pub mod cluster;
pub mod collector;
pub mod health;
pub mod models;
pub mod observability;
pub mod pricing;
pub mod quantity;
pub mod snapshot;

pub use classifier::{ClassifierConfig, EnvironmentClassifier};
pub use cluster::{CacheError, KubeClusterCache, ObjectCache};
pub use collector::{CollectError, MetricsServerSource, UsageCollection, UsageCollector};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use pricing::NodePriceLookup;
pub use snapshot::{SnapshotBuilder, SnapshotLoop, SnapshotLoopBuilder, SnapshotStore};
