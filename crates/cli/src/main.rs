//! ClusterCost CLI
//!
//! A command-line tool for reading namespace and node cost snapshots
//! from a running ClusterCost agent.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{namespaces, nodes, resources, status};

/// ClusterCost CLI
#[derive(Parser)]
#[command(name = "ccost")]
#[command(author, version, about = "CLI for the ClusterCost agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via CCOST_API_URL env var)
    #[arg(long, env = "CCOST_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show hourly cost per namespace
    Namespaces {
        /// Only show namespaces in this environment (production, nonprod, system, unknown)
        #[arg(long, short)]
        environment: Option<String>,
    },

    /// Show hourly cost and utilization per node
    Nodes,

    /// Show cluster-wide resource totals
    Resources,

    /// Show agent health and cluster identity
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Namespaces { environment } => {
            namespaces::show_namespaces(&client, environment, cli.format).await?;
        }
        Commands::Nodes => {
            nodes::show_nodes(&client, cli.format).await?;
        }
        Commands::Resources => {
            resources::show_resources(&client, cli.format).await?;
        }
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
