//! ClusterCost agent - Kubernetes cost snapshot agent
//!
//! Runs as a single Deployment per cluster, mirroring cluster objects and
//! pod usage into periodic namespace and node cost snapshots served over HTTP.

use agent_lib::{
    api::{self, AppState, ClusterInfo},
    cluster::{detect_cluster_region, KubeClusterCache, ObjectCache},
    collector::{MetricsServerSource, UsageCollector},
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    pricing::NodePriceLookup,
    snapshot::{SnapshotBuilder, SnapshotLoopBuilder, SnapshotStore},
    ClassifierConfig, EnvironmentClassifier,
};
use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");
const REGION_DETECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::AgentConfig::load()?;

    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .with(fmt::layer().json())
        .init();

    let shutdown = CancellationToken::new();
    let logger = StructuredLogger::new(&config.cluster_id);
    tokio::spawn(wait_for_signal(shutdown.clone(), logger.clone()));

    let client = kube_client(config.kubeconfig.as_deref()).await?;

    let region = match tokio::time::timeout(
        REGION_DETECT_TIMEOUT,
        detect_cluster_region(client.clone()),
    )
    .await
    {
        Ok(Ok(region)) => {
            info!(cluster_region = %region, "Detected cluster region");
            region
        }
        Ok(Err(e)) => {
            warn!(error = %format!("{e:#}"), "Failed to detect cluster region");
            config.pricing.region.clone()
        }
        Err(_) => {
            warn!("Cluster region detection timed out");
            config.pricing.region.clone()
        }
    };

    logger.log_startup(AGENT_VERSION, &config.cluster_name, &region);

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLUSTER_CACHE).await;
    health_registry.register(components::USAGE_COLLECTOR).await;
    health_registry.register(components::SNAPSHOT_LOOP).await;

    // The cache has no partial-sync mode; failing here is fatal
    let cache = Arc::new(KubeClusterCache::new(client.clone()));
    let sync_start = Instant::now();
    cache
        .start(shutdown.clone(), config.cache_sync_timeout())
        .await
        .context("start cluster cache")?;
    logger.log_cache_synced(sync_start.elapsed().as_millis());

    let classifier_config: ClassifierConfig = (&config.environment).into();
    let classifier = EnvironmentClassifier::new(&classifier_config);
    let prices = NodePriceLookup::new(
        config
            .pricing
            .instance_prices
            .iter()
            .map(|(instance_type, price)| (instance_type.as_str(), *price)),
        config.pricing.default_node_hourly_usd,
    );
    let builder = SnapshotBuilder::new(config.cluster_id.clone(), classifier, prices);
    let store = Arc::new(SnapshotStore::new());
    let collector = Arc::new(UsageCollector::new(Arc::new(MetricsServerSource::new(
        client,
    ))));

    let snapshot_loop = SnapshotLoopBuilder::new()
        .cache(cache.clone())
        .collector(collector)
        .snapshot_builder(builder)
        .store(store.clone())
        .interval(config.scrape_interval())
        .collect_timeout(config.metrics_timeout())
        .metrics(AgentMetrics::new())
        .health(health_registry.clone())
        .logger(logger.clone())
        .build()?;
    let loop_handle = tokio::spawn(snapshot_loop.run(shutdown.clone()));

    let app_state = Arc::new(AppState::new(
        store,
        health_registry,
        ClusterInfo {
            id: config.cluster_id.clone(),
            name: config.cluster_name.clone(),
            region,
        },
        AGENT_VERSION,
    ));

    let served = api::serve(config.listen_socket_addr()?, app_state, shutdown.clone()).await;

    // Stop the loop even when the server failed on its own
    shutdown.cancel();
    if let Err(e) = loop_handle.await {
        warn!(error = %e, "Snapshot loop task failed");
    }
    cache.stop();

    served
}

/// Client from an explicit kubeconfig path, else in-cluster or default config
async fn kube_client(kubeconfig: Option<&str>) -> Result<Client> {
    let Some(path) = kubeconfig.filter(|p| !p.is_empty()) else {
        return Client::try_default().await.context("create kube client");
    };

    let kubeconfig =
        Kubeconfig::read_from(path).with_context(|| format!("read kubeconfig {}", path))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("load kubeconfig")?;
    Client::try_from(config).context("create kube client")
}

async fn wait_for_signal(shutdown: CancellationToken, logger: StructuredLogger) {
    let reason = shutdown_signal().await;
    logger.log_shutdown(reason);
    shutdown.cancel();
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT received";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT received",
        _ = terminate.recv() => "SIGTERM received",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT received"
}
