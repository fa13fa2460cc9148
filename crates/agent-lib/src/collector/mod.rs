//! Pod usage collection
//!
//! Pulls per-pod CPU and memory usage from a metrics source and keeps the
//! last successful reading. When a refresh fails the previous reading is
//! still served, together with the error, so callers can keep building
//! snapshots on stale-but-present data.

mod metrics_server;

#[cfg(test)]
mod tests;

pub use metrics_server::MetricsServerSource;

use crate::models::{pod_key, PodUsage};
use crate::quantity;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Usage keyed by `"<namespace>/<pod>"`
pub type UsageMap = HashMap<String, PodUsage>;

/// Default ceiling for a single collection attempt
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Usage reported for one container
#[derive(Debug, Clone, Default)]
pub struct ContainerUsage {
    pub name: String,
    pub cpu: Option<Quantity>,
    pub memory: Option<Quantity>,
}

/// Usage sample for one pod as returned by a metrics source
#[derive(Debug, Clone, Default)]
pub struct PodMetricsSample {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<ContainerUsage>,
}

/// Source of live per-pod usage samples
#[async_trait]
pub trait PodMetricsSource: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<PodMetricsSample>>;
}

/// Errors raised while collecting usage
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("metrics client not configured")]
    NotConfigured,

    #[error("list pod metrics: {0:#}")]
    List(anyhow::Error),

    #[error("list pod metrics: timed out after {0:?}")]
    Timeout(Duration),
}

/// Result of a collection attempt that produced usable data
#[derive(Debug, Clone)]
pub struct UsageCollection {
    pub usage: Arc<UsageMap>,
    /// Set when `usage` is the previous reading because the refresh failed
    pub warning: Option<Arc<CollectError>>,
}

impl UsageCollection {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// Collects pod usage and caches the last good reading
pub struct UsageCollector {
    source: Option<Arc<dyn PodMetricsSource>>,
    last: RwLock<Option<Arc<UsageMap>>>,
}

impl UsageCollector {
    pub fn new(source: Arc<dyn PodMetricsSource>) -> Self {
        Self {
            source: Some(source),
            last: RwLock::new(None),
        }
    }

    /// Collector with no usage source; every collection fails informatively
    pub fn unconfigured() -> Self {
        Self {
            source: None,
            last: RwLock::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.source.is_some()
    }

    /// Query the source once, bounded by `timeout`.
    ///
    /// On success the fresh map replaces the cache. On failure the cached map
    /// is returned with the error attached as a warning; without a cache the
    /// error is returned.
    pub async fn collect_pod_metrics(
        &self,
        timeout: Duration,
    ) -> Result<UsageCollection, CollectError> {
        let source = self.source.as_ref().ok_or(CollectError::NotConfigured)?;

        let error = match tokio::time::timeout(timeout, source.list()).await {
            Ok(Ok(samples)) => {
                let usage = Arc::new(aggregate_samples(&samples));
                debug!(pods = usage.len(), "Collected pod usage");
                *self.last.write().await = Some(usage.clone());
                return Ok(UsageCollection {
                    usage,
                    warning: None,
                });
            }
            Ok(Err(e)) => CollectError::List(e),
            Err(_) => CollectError::Timeout(timeout),
        };

        match self.last.read().await.clone() {
            Some(usage) => Ok(UsageCollection {
                usage,
                warning: Some(Arc::new(error)),
            }),
            None => Err(error),
        }
    }

    /// Last successful reading, if any
    pub async fn last(&self) -> Option<Arc<UsageMap>> {
        self.last.read().await.clone()
    }
}

/// Sum container usage per pod
pub fn aggregate_samples(samples: &[PodMetricsSample]) -> UsageMap {
    let mut usage = UsageMap::with_capacity(samples.len());
    for sample in samples {
        let mut total = PodUsage::default();
        for container in &sample.containers {
            total.cpu_usage_milli += container.cpu.as_ref().map(quantity::cpu_milli).unwrap_or(0);
            total.memory_usage_bytes += container
                .memory
                .as_ref()
                .map(quantity::memory_bytes)
                .unwrap_or(0);
        }
        usage.insert(pod_key(&sample.namespace, &sample.name), total);
    }
    usage
}
