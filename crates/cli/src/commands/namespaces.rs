//! Namespace cost listing

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, NamespaceCost};
use crate::output::{
    color_environment, format_bytes, format_cpu, format_hourly, format_timestamp, print_json,
    print_rows, OutputFormat,
};

#[derive(Tabled)]
struct NamespaceRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "Pods")]
    pods: u32,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "CPU Used")]
    cpu_usage: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Mem Used")]
    memory_usage: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

impl From<&NamespaceCost> for NamespaceRow {
    fn from(ns: &NamespaceCost) -> Self {
        Self {
            namespace: ns.namespace.clone(),
            environment: color_environment(&ns.environment),
            pods: ns.pod_count,
            cpu_request: format_cpu(ns.cpu_request_milli),
            cpu_usage: format_cpu(ns.cpu_usage_milli),
            memory_request: format_bytes(ns.memory_request_bytes),
            memory_usage: format_bytes(ns.memory_usage_bytes),
            cost: format_hourly(ns.hourly_cost),
        }
    }
}

fn filter_environment(items: &mut Vec<NamespaceCost>, environment: Option<&str>) {
    if let Some(env) = environment {
        items.retain(|ns| ns.environment.eq_ignore_ascii_case(env));
    }
}

/// Most expensive first, ties by name
fn sort_by_cost(items: &mut [NamespaceCost]) {
    items.sort_by(|a, b| {
        b.hourly_cost
            .total_cmp(&a.hourly_cost)
            .then_with(|| a.namespace.cmp(&b.namespace))
    });
}

/// Show hourly cost per namespace
pub async fn show_namespaces(
    client: &ApiClient,
    environment: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut list = client.namespaces().await?;
    filter_environment(&mut list.items, environment.as_deref());

    match format {
        OutputFormat::Json => print_json(&list)?,
        OutputFormat::Table => {
            let mut items = list.items;
            sort_by_cost(&mut items);
            let total: f64 = items.iter().map(|ns| ns.hourly_cost).sum();

            println!("{}", "Namespace Costs".bold());
            println!("{}", "=".repeat(50));
            println!("Snapshot: {}", format_timestamp(&list.timestamp));
            println!();

            print_rows(items.iter().map(NamespaceRow::from).collect());

            println!();
            println!("{} {}", "Total:".bold(), format_hourly(total).green());
        }
    }

    Ok(())
}
