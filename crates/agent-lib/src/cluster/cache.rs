//! Reflector-backed cluster cache
//!
//! One watch per kind feeds a reflector store. The stores start empty and
//! only become readable once every watch has delivered its initial list.

use super::{CacheError, ObjectCache};
use async_trait::async_trait;
use futures::{future, StreamExt};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::runtime::reflector::{self, store::Writer, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Writers {
    nodes: Writer<Node>,
    namespaces: Writer<Namespace>,
    pods: Writer<Pod>,
}

/// Watch-based mirror of nodes, namespaces and pods
pub struct KubeClusterCache {
    client: Client,
    nodes: Store<Node>,
    namespaces: Store<Namespace>,
    pods: Store<Pod>,
    /// Taken on first start; a second start is rejected
    writers: Mutex<Option<Writers>>,
    synced: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl KubeClusterCache {
    pub fn new(client: Client) -> Self {
        let (nodes, node_writer) = reflector::store();
        let (namespaces, namespace_writer) = reflector::store();
        let (pods, pod_writer) = reflector::store();

        Self {
            client,
            nodes,
            namespaces,
            pods,
            writers: Mutex::new(Some(Writers {
                nodes: node_writer,
                namespaces: namespace_writer,
                pods: pod_writer,
            })),
            synced: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Whether the initial sync has completed
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Abort all watch tasks
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    fn take_writers(&self) -> Result<Writers, CacheError> {
        self.writers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(CacheError::AlreadyStarted)
    }

    fn ensure_synced(&self) -> Result<(), CacheError> {
        if self.is_synced() {
            Ok(())
        } else {
            Err(CacheError::NotStarted)
        }
    }

    async fn wait_for_sync(&self) -> Result<(), CacheError> {
        tokio::try_join!(
            wait_ready(&self.nodes, "node"),
            wait_ready(&self.namespaces, "namespace"),
            wait_ready(&self.pods, "pod"),
        )?;
        Ok(())
    }
}

#[async_trait]
impl ObjectCache for KubeClusterCache {
    async fn start(
        &self,
        shutdown: CancellationToken,
        sync_timeout: Duration,
    ) -> Result<(), CacheError> {
        if shutdown.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let writers = self.take_writers()?;
        info!(timeout_secs = sync_timeout.as_secs(), "Starting cluster object watches");

        let handles = vec![
            spawn_reflector(Api::<Node>::all(self.client.clone()), writers.nodes, shutdown.clone()),
            spawn_reflector(
                Api::<Namespace>::all(self.client.clone()),
                writers.namespaces,
                shutdown.clone(),
            ),
            spawn_reflector(Api::<Pod>::all(self.client.clone()), writers.pods, shutdown.clone()),
        ];
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(handles);

        let result = tokio::select! {
            _ = shutdown.cancelled() => Err(CacheError::Cancelled),
            res = tokio::time::timeout(sync_timeout, self.wait_for_sync()) => match res {
                Ok(inner) => inner,
                Err(_) => Err(CacheError::SyncTimedOut(sync_timeout)),
            },
        };

        match result {
            Ok(()) => {
                self.synced.store(true, Ordering::Release);
                info!(
                    nodes = self.nodes.state().len(),
                    namespaces = self.namespaces.state().len(),
                    pods = self.pods.state().len(),
                    "Cluster cache synced"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Cluster cache failed to sync");
                self.stop();
                Err(e)
            }
        }
    }

    fn list_nodes(&self) -> Result<Vec<Arc<Node>>, CacheError> {
        self.ensure_synced()?;
        Ok(self.nodes.state())
    }

    fn list_namespaces(&self) -> Result<Vec<Arc<Namespace>>, CacheError> {
        self.ensure_synced()?;
        Ok(self.namespaces.state())
    }

    fn list_pods(&self) -> Result<Vec<Arc<Pod>>, CacheError> {
        self.ensure_synced()?;
        Ok(self.pods.state())
    }
}

impl Drop for KubeClusterCache {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn wait_ready<K>(store: &Store<K>, kind: &'static str) -> Result<(), CacheError>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    store
        .wait_until_ready()
        .await
        .map_err(|_| CacheError::WatchStopped { kind })?;
    debug!(kind, "Initial list received");
    Ok(())
}

/// Drive one reflector until the stream ends or shutdown is requested.
/// Watch errors are retried with backoff; reconnects resync transparently.
fn spawn_reflector<K>(api: Api<K>, writer: Writer<K>, shutdown: CancellationToken) -> JoinHandle<()>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    let kind = K::kind(&K::DynamicType::default()).to_string();

    tokio::spawn(async move {
        let error_kind = kind.clone();
        let watch = reflector::reflector(
            writer,
            watcher(api, watcher::Config::default()).default_backoff(),
        )
        .applied_objects()
        .for_each(move |event| {
            if let Err(e) = event {
                warn!(kind = %error_kind, error = %e, "Watch error, retrying");
            }
            future::ready(())
        });

        tokio::select! {
            _ = watch => warn!(kind = %kind, "Watch stream ended"),
            _ = shutdown.cancelled() => debug!(kind = %kind, "Stopping watch"),
        }
    })
}
