//! Container stats command

use anyhow::Result;
use colored::Colorize;
use monitor_lib::{
    error::CounterError,
    models::{ContainerSample, ContainerStat, ContainerUsage},
    rate::container_cpu_percent,
    sink::format_bytes,
    source::DockerClient,
};
use tabled::Tabled;

use crate::output::{color_percent, print_info, print_json, print_warning, OutputFormat};

/// Row for containers table
#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

/// Convert runtime readings to webhook stats, keyed by container id
///
/// A reading whose counters went backwards reports 0% and its error is returned.
pub fn container_stats(
    samples: Vec<ContainerSample>,
) -> (Vec<(String, ContainerStat)>, Vec<CounterError>) {
    let mut errors = Vec::new();

    let stats = samples
        .into_iter()
        .map(|sample| {
            let cpu_usage = container_cpu_percent(&sample.name, &sample.cpu, sample.online_cpus)
                .unwrap_or_else(|e| {
                    errors.push(e);
                    0.0
                });
            (
                sample.id,
                ContainerStat {
                    container_name: sample.name,
                    stats: ContainerUsage {
                        memory_usage: sample.memory_usage,
                        cpu_usage,
                    },
                },
            )
        })
        .collect();

    (stats, errors)
}

/// Show one stats reading per running container
///
/// JSON output is the webhook payload for the same readings.
pub async fn show_containers(format: OutputFormat) -> Result<()> {
    let client = DockerClient::from_env().await?;
    let samples = client.sample_containers().await?;

    let (stats, errors) = container_stats(samples);
    for error in &errors {
        print_warning(&error.to_string());
    }

    match format {
        OutputFormat::Json => {
            let payload: Vec<&ContainerStat> = stats.iter().map(|(_, s)| s).collect();
            print_json(&payload)?;
        }
        OutputFormat::Table => {
            if stats.is_empty() {
                print_info("No running containers");
                return Ok(());
            }

            println!(
                "{} (API v{})",
                "Containers".bold(),
                client.api_version()
            );

            let rows: Vec<ContainerRow> = stats
                .iter()
                .map(|(id, s)| ContainerRow {
                    id: id.chars().take(12).collect(),
                    name: s.container_name.clone(),
                    cpu: color_percent(s.stats.cpu_usage),
                    memory: format_bytes(s.stats.memory_usage),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} containers", stats.len());
        }
    }

    Ok(())
}
