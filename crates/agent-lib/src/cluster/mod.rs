//! Cluster object cache
//!
//! Mirrors nodes, namespaces and pods in memory. Reads are served from the
//! local mirror; the mirror itself is kept current by background watches.

mod cache;
mod region;

pub use cache::KubeClusterCache;
pub use region::{detect_cluster_region, region_from_node, region_from_zone};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors raised by the object cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cluster cache not started")]
    NotStarted,

    #[error("cluster cache already started")]
    AlreadyStarted,

    #[error("cache sync timed out after {0:?}")]
    SyncTimedOut(Duration),

    #[error("cache sync timed out: startup cancelled")]
    Cancelled,

    #[error("{kind} watch stopped before initial sync")]
    WatchStopped { kind: &'static str },
}

/// Read-only view over cached cluster objects
#[async_trait]
pub trait ObjectCache: Send + Sync {
    /// Begin watching and block until every kind has completed its initial
    /// list, the timeout elapses, or `shutdown` is cancelled.
    async fn start(&self, shutdown: CancellationToken, sync_timeout: Duration)
        -> Result<(), CacheError>;

    fn list_nodes(&self) -> Result<Vec<Arc<Node>>, CacheError>;

    fn list_namespaces(&self) -> Result<Vec<Arc<Namespace>>, CacheError>;

    fn list_pods(&self) -> Result<Vec<Arc<Pod>>, CacheError>;
}
