//! HTTP API serving the latest snapshot, health checks and Prometheus metrics

use crate::health::{ComponentStatus, HealthRegistry};
use crate::models::{NamespaceCostRecord, NodeCostRecord, ResourceSnapshot};
use crate::snapshot::SnapshotStore;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const CLUSTER_TYPE: &str = "k8s";
const NOT_READY: &str = "snapshot not ready";

/// Identity reported by the health endpoint
#[derive(Debug, Clone, Default)]
pub struct ClusterInfo {
    pub id: String,
    pub name: String,
    pub region: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub health_registry: HealthRegistry,
    pub cluster: ClusterInfo,
    pub version: String,
}

impl AppState {
    pub fn new(
        store: Arc<SnapshotStore>,
        health_registry: HealthRegistry,
        cluster: ClusterInfo,
        version: impl Into<String>,
    ) -> Self {
        Self {
            store,
            health_registry,
            cluster,
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHealthResponse {
    /// `ok` once a snapshot exists, `initializing` before
    pub status: String,
    pub cluster_id: String,
    pub cluster_name: String,
    pub cluster_type: String,
    pub cluster_region: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespacesResponse {
    pub items: Vec<NamespaceCostRecord>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodesResponse {
    pub items: Vec<NodeCostRecord>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesResponse {
    pub snapshot: ResourceSnapshot,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// RFC 3339 in UTC with nanosecond precision
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn not_ready() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: NOT_READY.to_string(),
        }),
    )
        .into_response()
}

async fn agent_health(State(state): State<Arc<AppState>>) -> Json<AgentHealthResponse> {
    let (status, timestamp) = match state.store.latest().await {
        Some(snapshot) => ("ok", snapshot.timestamp),
        None => ("initializing", Utc::now()),
    };

    Json(AgentHealthResponse {
        status: status.to_string(),
        cluster_id: state.cluster.id.clone(),
        cluster_name: state.cluster.name.clone(),
        cluster_type: CLUSTER_TYPE.to_string(),
        cluster_region: state.cluster.region.clone(),
        version: state.version.clone(),
        timestamp: format_timestamp(timestamp),
    })
}

async fn namespaces(State(state): State<Arc<AppState>>) -> Response {
    match state.store.latest().await {
        Some(snapshot) => Json(NamespacesResponse {
            items: snapshot.namespaces.clone(),
            timestamp: format_timestamp(snapshot.timestamp),
        })
        .into_response(),
        None => not_ready(),
    }
}

async fn nodes(State(state): State<Arc<AppState>>) -> Response {
    match state.store.latest().await {
        Some(snapshot) => Json(NodesResponse {
            items: snapshot.nodes.clone(),
            timestamp: format_timestamp(snapshot.timestamp),
        })
        .into_response(),
        None => not_ready(),
    }
}

async fn resources(State(state): State<Arc<AppState>>) -> Response {
    match state.store.latest().await {
        Some(snapshot) => Json(ResourcesResponse {
            snapshot: snapshot.resources.clone(),
            timestamp: format_timestamp(snapshot.timestamp),
        })
        .into_response(),
        None => not_ready(),
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving the last snapshot
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/agent/v1/health", get(agent_health))
        .route("/agent/v1/namespaces", get(namespaces))
        .route("/agent/v1/nodes", get(nodes))
        .route("/agent/v1/resources", get(resources))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
