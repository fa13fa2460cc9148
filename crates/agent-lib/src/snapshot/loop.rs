//! Snapshot refresh loop
//!
//! Periodically lists the cluster cache, collects usage, builds a snapshot
//! and publishes it to the store. A failed iteration is logged and retried on
//! the next tick; the store keeps serving the previous snapshot meanwhile.

use super::{SnapshotBuilder, SnapshotStore};
use crate::cluster::{CacheError, ObjectCache};
use crate::collector::{UsageCollector, UsageMap, DEFAULT_COLLECT_TIMEOUT};
use crate::health::{components, HealthRegistry};
use crate::models::Snapshot;
use crate::observability::{AgentMetrics, StructuredLogger};
use anyhow::Result;
use chrono::Utc;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Supplies an already computed network summary for each snapshot
pub trait NetworkSummaryProvider: Send + Sync {
    fn summary(&self) -> Option<serde_json::Value>;
}

/// Errors that abandon a single loop iteration
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("list {kind}: {source}")]
    List {
        kind: &'static str,
        #[source]
        source: CacheError,
    },
}

type ClusterObjects = (Vec<Arc<Node>>, Vec<Arc<Namespace>>, Vec<Arc<Pod>>);

/// Configuration for the snapshot loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Time between iterations (default: 60 seconds)
    pub interval: Duration,
    /// Ceiling for one usage collection, independent of the interval
    pub collect_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            collect_timeout: DEFAULT_COLLECT_TIMEOUT,
        }
    }
}

/// Loop that keeps the snapshot store current
pub struct SnapshotLoop {
    cache: Arc<dyn ObjectCache>,
    collector: Arc<UsageCollector>,
    builder: SnapshotBuilder,
    store: Arc<SnapshotStore>,
    config: LoopConfig,
    metrics: Option<AgentMetrics>,
    health: Option<HealthRegistry>,
    logger: StructuredLogger,
    network: Option<Arc<dyn NetworkSummaryProvider>>,
}

impl SnapshotLoop {
    /// Run until `shutdown` is cancelled.
    ///
    /// The first iteration runs immediately. Cancellation is observed between
    /// iterations, so an iteration in progress always completes.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            collect_timeout_secs = self.config.collect_timeout.as_secs(),
            "Starting snapshot loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutting down snapshot loop");
                    break;
                }
                _ = ticker.tick() => {
                    // Errors are already reported inside run_once
                    let _ = self.run_once().await;
                }
            }
        }
    }

    /// One refresh: list, collect, build, publish.
    pub async fn run_once(&self) -> Result<Arc<Snapshot>, SnapshotError> {
        let start = Instant::now();

        let (nodes, namespaces, pods) = match self.list_objects() {
            Ok(lists) => lists,
            Err(e) => {
                self.logger.log_snapshot_failed(&e.to_string());
                if let Some(metrics) = &self.metrics {
                    metrics.inc_snapshot_failures();
                }
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::SNAPSHOT_LOOP, e.to_string())
                        .await;
                }
                return Err(e);
            }
        };

        let usage = self.collect_usage().await;

        let build_start = Instant::now();
        let snapshot = self
            .builder
            .build(&nodes, &namespaces, &pods, &usage, Utc::now())
            .with_network(self.network.as_ref().and_then(|n| n.summary()));
        if let Some(metrics) = &self.metrics {
            metrics.observe_build_latency(build_start.elapsed().as_secs_f64());
        }

        let snapshot = self.store.update(snapshot).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_snapshot(&snapshot);
        }
        if let Some(health) = &self.health {
            health.set_healthy(components::SNAPSHOT_LOOP).await;
            health.snapshot_published(snapshot.timestamp).await;
        }
        self.logger
            .log_snapshot_published(&snapshot, start.elapsed().as_millis());

        Ok(snapshot)
    }

    /// All three listings, or the first failure. No partial snapshot is built.
    fn list_objects(&self) -> Result<ClusterObjects, SnapshotError> {
        let nodes = self
            .cache
            .list_nodes()
            .map_err(|source| SnapshotError::List { kind: "nodes", source })?;
        let namespaces = self
            .cache
            .list_namespaces()
            .map_err(|source| SnapshotError::List {
                kind: "namespaces",
                source,
            })?;
        let pods = self
            .cache
            .list_pods()
            .map_err(|source| SnapshotError::List { kind: "pods", source })?;
        Ok((nodes, namespaces, pods))
    }

    /// Usage for this iteration. Failures degrade to cached or empty usage,
    /// in which case the builder falls back to requests.
    async fn collect_usage(&self) -> Arc<UsageMap> {
        let start = Instant::now();
        let result = self
            .collector
            .collect_pod_metrics(self.config.collect_timeout)
            .await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_usage_collection_latency(start.elapsed().as_secs_f64());
        }

        match result {
            Ok(collection) => {
                match &collection.warning {
                    Some(error) => {
                        self.usage_failed(&error.to_string(), collection.usage.len())
                            .await
                    }
                    None => {
                        if let Some(health) = &self.health {
                            health.set_healthy(components::USAGE_COLLECTOR).await;
                        }
                        debug!(pods = collection.usage.len(), "Pod usage refreshed");
                    }
                }
                collection.usage
            }
            Err(error) => {
                self.usage_failed(&error.to_string(), 0).await;
                Arc::new(UsageMap::new())
            }
        }
    }

    async fn usage_failed(&self, error: &str, cached_pods: usize) {
        self.logger.log_usage_degraded(error, cached_pods);
        if let Some(metrics) = &self.metrics {
            metrics.inc_usage_collection_errors();
        }
        if let Some(health) = &self.health {
            health
                .set_degraded(components::USAGE_COLLECTOR, error.to_string())
                .await;
        }
    }
}

/// Builder for the snapshot loop
pub struct SnapshotLoopBuilder {
    cache: Option<Arc<dyn ObjectCache>>,
    collector: Option<Arc<UsageCollector>>,
    builder: Option<SnapshotBuilder>,
    store: Option<Arc<SnapshotStore>>,
    config: LoopConfig,
    metrics: Option<AgentMetrics>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    network: Option<Arc<dyn NetworkSummaryProvider>>,
}

impl SnapshotLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            cache: None,
            collector: None,
            builder: None,
            store: None,
            config: LoopConfig::default(),
            metrics: None,
            health: None,
            logger: None,
            network: None,
        }
    }

    pub fn cache(mut self, cache: Arc<dyn ObjectCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn collector(mut self, collector: Arc<UsageCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn snapshot_builder(mut self, builder: SnapshotBuilder) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn store(mut self, store: Arc<SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the refresh interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the usage collection timeout
    pub fn collect_timeout(mut self, timeout: Duration) -> Self {
        self.config.collect_timeout = timeout;
        self
    }

    pub fn metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn network(mut self, provider: Arc<dyn NetworkSummaryProvider>) -> Self {
        self.network = Some(provider);
        self
    }

    /// Build the snapshot loop
    pub fn build(self) -> Result<SnapshotLoop> {
        let cache = self
            .cache
            .ok_or_else(|| anyhow::anyhow!("Cache is required"))?;
        let collector = self
            .collector
            .ok_or_else(|| anyhow::anyhow!("Collector is required"))?;
        let builder = self
            .builder
            .ok_or_else(|| anyhow::anyhow!("Snapshot builder is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Store is required"))?;

        if self.config.interval.is_zero() {
            anyhow::bail!("Snapshot interval must be greater than zero");
        }

        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new(builder.cluster_id()));

        Ok(SnapshotLoop {
            cache,
            collector,
            builder,
            store,
            config: self.config,
            metrics: self.metrics,
            health: self.health,
            logger,
            network: self.network,
        })
    }
}

impl Default for SnapshotLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
