//! Cluster-wide resource totals

use anyhow::Result;
use colored::Colorize;

use crate::client::ApiClient;
use crate::output::{
    format_bytes, format_cpu, format_hourly, format_percent, format_timestamp, print_json,
    OutputFormat,
};

fn ratio(used: i64, requested: i64) -> Option<f64> {
    (requested > 0).then(|| used as f64 / requested as f64 * 100.0)
}

/// Show cluster-wide resource totals
pub async fn show_resources(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result = client.resources().await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            let totals = &result.snapshot;

            println!("{}", "Cluster Resources".bold());
            println!("{}", "=".repeat(50));
            println!("Cluster:                {}", totals.cluster_id.cyan());
            println!("Snapshot:               {}", format_timestamp(&result.timestamp));
            println!();

            println!("{}", "CPU".bold());
            println!("{}", "-".repeat(50));
            println!("Requested:              {}", format_cpu(totals.cpu_request_milli_total));
            println!("Used:                   {}", format_cpu(totals.cpu_usage_milli_total));
            if let Some(pct) = ratio(totals.cpu_usage_milli_total, totals.cpu_request_milli_total) {
                println!("Used / Requested:       {}", format_percent(pct));
            }
            println!();

            println!("{}", "Memory".bold());
            println!("{}", "-".repeat(50));
            println!(
                "Requested:              {}",
                format_bytes(totals.memory_request_bytes_total)
            );
            println!(
                "Used:                   {}",
                format_bytes(totals.memory_usage_bytes_total)
            );
            if let Some(pct) = ratio(
                totals.memory_usage_bytes_total,
                totals.memory_request_bytes_total,
            ) {
                println!("Used / Requested:       {}", format_percent(pct));
            }
            println!();

            println!(
                "{} {}",
                "Node Cost:".bold(),
                format_hourly(totals.total_node_hourly_cost).green()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_skips_zero_requests() {
        assert_eq!(ratio(10, 0), None);
        assert_eq!(ratio(400, 500), Some(80.0));
    }
}
