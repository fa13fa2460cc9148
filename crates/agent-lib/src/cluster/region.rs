//! Cloud region detection from node metadata

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::{Api, Client};
use std::collections::BTreeMap;

const REGION_LABELS: &[&str] = &[
    "topology.kubernetes.io/region",
    "failure-domain.beta.kubernetes.io/region",
];

const ZONE_LABELS: &[&str] = &[
    "topology.kubernetes.io/zone",
    "failure-domain.beta.kubernetes.io/zone",
];

/// Best guess of the cluster's region from the first node that reveals one
pub async fn detect_cluster_region(client: Client) -> Result<String> {
    let nodes: Api<Node> = Api::all(client);
    let list = nodes
        .list(&ListParams::default())
        .await
        .context("list nodes for region detection")?;

    list.items
        .iter()
        .find_map(|node| {
            let provider_id = node
                .spec
                .as_ref()
                .and_then(|s| s.provider_id.as_deref())
                .unwrap_or_default();
            region_from_node(node.metadata.labels.as_ref(), provider_id)
        })
        .context("cluster region not discovered")
}

/// Region from explicit labels, then zone labels, then the provider ID
pub fn region_from_node(
    labels: Option<&BTreeMap<String, String>>,
    provider_id: &str,
) -> Option<String> {
    let label = |key: &str| {
        labels
            .and_then(|l| l.get(key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    if let Some(region) = REGION_LABELS.iter().find_map(|key| label(*key)) {
        return Some(region.to_string());
    }

    if let Some(region) = ZONE_LABELS
        .iter()
        .filter_map(|key| label(*key))
        .find_map(region_from_zone)
    {
        return Some(region);
    }

    region_from_provider_id(provider_id)
}

/// Strip the zone letter: `us-east-1a` → `us-east-1`, `europe-west1-b` → `europe-west1`
pub fn region_from_zone(zone: &str) -> Option<String> {
    if zone.is_empty() {
        return None;
    }

    if let Some(idx) = zone.rfind('-') {
        let suffix = &zone[idx + 1..];
        if idx > 0 && suffix.len() == 1 && suffix.as_bytes()[0].is_ascii_lowercase() {
            return Some(zone[..idx].to_string());
        }
    }

    let last = *zone.as_bytes().last()?;
    if zone.len() > 1 && last.is_ascii_lowercase() {
        return Some(zone[..zone.len() - 1].to_string());
    }
    None
}

fn region_from_provider_id(provider_id: &str) -> Option<String> {
    let provider_id = provider_id.trim();
    let known = ["aws://", "gce://", "gke://", "ibm://"];
    if !known.iter().any(|p| provider_id.starts_with(p)) {
        return None;
    }

    // aws:///us-east-1a/i-0abc → ["aws:", "", "", "us-east-1a", "i-0abc"]
    provider_id
        .split('/')
        .nth(3)
        .and_then(region_from_zone)
}
