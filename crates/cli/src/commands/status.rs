//! Agent status

use anyhow::Result;
use colored::Colorize;

use crate::client::ApiClient;
use crate::output::{color_status, format_timestamp, print_info, print_json, OutputFormat};

/// Show agent health and cluster identity
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            println!("{}", "Agent Status".bold());
            println!("{}", "=".repeat(50));
            println!("Status:                 {}", color_status(&health.status));
            println!("Cluster ID:             {}", health.cluster_id.cyan());
            println!("Cluster Name:           {}", health.cluster_name);
            println!("Cluster Type:           {}", health.cluster_type);
            println!("Region:                 {}", health.cluster_region);
            println!("Agent Version:          {}", health.version);
            println!("Timestamp:              {}", format_timestamp(&health.timestamp));

            if health.status == "initializing" {
                println!();
                print_info("No snapshot has been published yet");
            }
        }
    }

    Ok(())
}
