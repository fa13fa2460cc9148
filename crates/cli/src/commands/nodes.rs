//! Node cost listing

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, NodeCost};
use crate::output::{
    color_percent, color_status, format_bytes, format_cpu, format_hourly, format_timestamp,
    print_json, print_rows, OutputFormat,
};

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "Instance")]
    instance_type: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Pods")]
    pods: u32,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "CPU %")]
    cpu_percent: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Mem %")]
    memory_percent: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

impl From<&NodeCost> for NodeRow {
    fn from(node: &NodeCost) -> Self {
        let status = if node.is_under_pressure {
            format!("{} {}", color_status(&node.status), "(pressure)".red())
        } else {
            color_status(&node.status)
        };

        Self {
            name: node.node_name.clone(),
            instance_type: node.instance_type.clone(),
            status,
            pods: node.pod_count,
            cpu: format_cpu(node.cpu_allocatable_milli),
            cpu_percent: color_percent(node.cpu_usage_percent),
            memory: format_bytes(node.memory_allocatable_bytes),
            memory_percent: color_percent(node.memory_usage_percent),
            cost: format_hourly(node.hourly_cost),
        }
    }
}

/// Show hourly cost and utilization per node
pub async fn show_nodes(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let list = client.nodes().await?;

    match format {
        OutputFormat::Json => print_json(&list)?,
        OutputFormat::Table => {
            let total: f64 = list.items.iter().map(|n| n.hourly_cost).sum();

            println!("{}", "Node Costs".bold());
            println!("{}", "=".repeat(50));
            println!("Snapshot: {}", format_timestamp(&list.timestamp));
            println!();

            print_rows(list.items.iter().map(NodeRow::from).collect());

            println!();
            println!("{} {}", "Total:".bold(), format_hourly(total).green());
        }
    }

    Ok(())
}
