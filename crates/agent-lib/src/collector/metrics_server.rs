//! `metrics.k8s.io` pod usage source

use super::{ContainerUsage, PodMetricsSample, PodMetricsSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_metrics::v1beta1::PodMetrics;
use kube::api::ListParams;
use kube::{Api, Client};

/// Lists pod usage from the metrics-server aggregated API
#[derive(Clone)]
pub struct MetricsServerSource {
    api: Api<PodMetrics>,
}

impl MetricsServerSource {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl PodMetricsSource for MetricsServerSource {
    async fn list(&self) -> Result<Vec<PodMetricsSample>> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .context("list PodMetrics")?;

        Ok(list.items.into_iter().map(sample_from_metrics).collect())
    }
}

fn sample_from_metrics(metrics: PodMetrics) -> PodMetricsSample {
    PodMetricsSample {
        namespace: metrics.metadata.namespace.unwrap_or_default(),
        name: metrics.metadata.name.unwrap_or_default(),
        containers: metrics
            .containers
            .into_iter()
            .map(|c| ContainerUsage {
                name: c.name,
                cpu: Some(c.usage.cpu),
                memory: Some(c.usage.memory),
            })
            .collect(),
    }
}
