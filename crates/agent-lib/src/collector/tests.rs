//! Tests for usage collection and degraded-mode fallback

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Source that replays scripted responses, one per call
struct ScriptedSource {
    responses: Mutex<Vec<anyhow::Result<Vec<PodMetricsSample>>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(responses: Vec<anyhow::Result<Vec<PodMetricsSample>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PodMetricsSource for ScriptedSource {
    async fn list(&self) -> anyhow::Result<Vec<PodMetricsSample>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Source that never answers
struct HangingSource;

#[async_trait]
impl PodMetricsSource for HangingSource {
    async fn list(&self) -> anyhow::Result<Vec<PodMetricsSample>> {
        std::future::pending().await
    }
}

fn sample(namespace: &str, name: &str, containers: &[(&str, &str)]) -> PodMetricsSample {
    PodMetricsSample {
        namespace: namespace.to_string(),
        name: name.to_string(),
        containers: containers
            .iter()
            .map(|(cpu, mem)| ContainerUsage {
                name: "c".to_string(),
                cpu: Some(Quantity(cpu.to_string())),
                memory: Some(Quantity(mem.to_string())),
            })
            .collect(),
    }
}

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_unconfigured_collector_fails() {
    let collector = UsageCollector::unconfigured();
    let err = collector.collect_pod_metrics(TIMEOUT).await.unwrap_err();
    assert!(matches!(err, CollectError::NotConfigured));
    assert!(!collector.is_configured());
}

#[tokio::test]
async fn test_success_sums_containers_per_pod() {
    let source = Arc::new(ScriptedSource::new(vec![Ok(vec![
        sample("default", "pod-a", &[("300m", "400Mi"), ("100m", "100Mi")]),
        sample("payments", "api-0", &[("1", "1Gi")]),
    ])]));
    let collector = UsageCollector::new(source);

    let result = collector.collect_pod_metrics(TIMEOUT).await.unwrap();
    assert!(!result.is_degraded());
    assert_eq!(
        result.usage["default/pod-a"],
        PodUsage {
            cpu_usage_milli: 400,
            memory_usage_bytes: 500 * 1024 * 1024,
        }
    );
    assert_eq!(result.usage["payments/api-0"].cpu_usage_milli, 1000);
}

#[tokio::test]
async fn test_failure_after_success_returns_cached_with_error() {
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(vec![sample("default", "pod-a", &[("400m", "1Mi")])]),
        Err(anyhow::anyhow!("metrics unavailable")),
    ]));
    let collector = UsageCollector::new(source.clone());

    let first = collector.collect_pod_metrics(TIMEOUT).await.unwrap();
    let second = collector.collect_pod_metrics(TIMEOUT).await.unwrap();

    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert!(second.is_degraded());
    assert_eq!(*first.usage, *second.usage);
    assert_eq!(second.usage["default/pod-a"].cpu_usage_milli, 400);

    let warning = second.warning.unwrap();
    assert!(warning.to_string().contains("metrics unavailable"));
}

#[tokio::test]
async fn test_failure_without_cache_returns_error() {
    let source = Arc::new(ScriptedSource::new(vec![Err(anyhow::anyhow!("boom"))]));
    let collector = UsageCollector::new(source);

    let err = collector.collect_pod_metrics(TIMEOUT).await.unwrap_err();
    assert!(matches!(err, CollectError::List(_)));
    assert!(err.to_string().starts_with("list pod metrics"));
    assert!(collector.last().await.is_none());
}

#[tokio::test]
async fn test_success_replaces_cache() {
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(vec![sample("default", "pod-a", &[("400m", "1Mi")])]),
        Ok(vec![sample("default", "pod-b", &[("200m", "1Mi")])]),
    ]));
    let collector = UsageCollector::new(source);

    collector.collect_pod_metrics(TIMEOUT).await.unwrap();
    collector.collect_pod_metrics(TIMEOUT).await.unwrap();

    let last = collector.last().await.unwrap();
    assert!(!last.contains_key("default/pod-a"));
    assert!(last.contains_key("default/pod-b"));
}

#[tokio::test]
async fn test_timeout_without_cache_is_error() {
    let collector = UsageCollector::new(Arc::new(HangingSource));
    let err = collector
        .collect_pod_metrics(Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, CollectError::Timeout(_)));
}

#[test]
fn test_aggregate_missing_quantities_count_as_zero() {
    let samples = vec![PodMetricsSample {
        namespace: "ns".to_string(),
        name: "p".to_string(),
        containers: vec![ContainerUsage {
            name: "c".to_string(),
            cpu: Some(Quantity("250m".to_string())),
            memory: None,
        }],
    }];
    let usage = aggregate_samples(&samples);
    assert_eq!(usage["ns/p"].cpu_usage_milli, 250);
    assert_eq!(usage["ns/p"].memory_usage_bytes, 0);
}
