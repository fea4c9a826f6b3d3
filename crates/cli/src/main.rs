//! Resource Monitor CLI
//!
//! A command-line tool for one-shot reports, container stats, the values
//! file and the status of a running monitor.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{containers, report, status, values};
use monitor_lib::values::DEFAULT_VALUES_FILE;
use std::path::PathBuf;

/// Resource Monitor CLI
#[derive(Parser, Debug)]
#[command(name = "rmon")]
#[command(author, version, about = "CLI for Resource Monitor", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample twice and print the resulting report
    Report {
        /// Milliseconds between the two samples
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Skip container sampling
        #[arg(long)]
        no_containers: bool,

        /// procfs mount point
        #[arg(long, env = "MONITOR_PROC_ROOT", default_value = "/proc")]
        proc_root: PathBuf,
    },

    /// Show CPU and memory usage of running containers
    Containers,

    /// Read or write the values file
    #[command(subcommand)]
    Values(ValuesCommands),

    /// Show health and readiness of a running monitor
    Status {
        /// Monitor API endpoint URL
        #[arg(long, env = "RMON_API_URL", default_value = "http://localhost:8080")]
        api_url: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ValuesCommands {
    /// Write a values file (key1..key3 when no --set is given)
    Write {
        /// Path of the values file
        #[arg(long, default_value = DEFAULT_VALUES_FILE)]
        path: PathBuf,

        /// Entry to store, as key=value; repeatable
        #[arg(long = "set", value_parser = monitor_lib::values::parse_pair)]
        entries: Vec<(String, serde_json::Value)>,
    },

    /// Read a values file and print its entries
    Read {
        /// Path of the values file
        #[arg(long, default_value = DEFAULT_VALUES_FILE)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            interval_ms,
            no_containers,
            proc_root,
        } => {
            report::show_report(interval_ms, !no_containers, proc_root, cli.format).await?;
        }
        Commands::Containers => {
            containers::show_containers(cli.format).await?;
        }
        Commands::Values(values_cmd) => match values_cmd {
            ValuesCommands::Write { path, entries } => {
                values::write_values(&path, entries, cli.format)?;
            }
            ValuesCommands::Read { path } => {
                values::read_values(&path, cli.format)?;
            }
        },
        Commands::Status { api_url } => {
            let client = client::ApiClient::new(&api_url)?;
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
