//! Monitor status command

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, OutputFormat};
use monitor_lib::health::{HealthResponse, ReadinessResponse};

/// Row for components table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct StatusOutput {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

fn status_label(status: monitor_lib::health::ComponentStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Show health and readiness of a running monitor
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    let readiness = client.readiness().await?;

    match format {
        OutputFormat::Json => print_json(&StatusOutput { health, readiness })?,
        OutputFormat::Table => {
            println!("{}", "Monitor Status".bold());
            println!("{}", "=".repeat(40));
            println!("Health:    {}", color_status(&status_label(health.status)));
            let ready = if readiness.ready { "ready" } else { "not ready" };
            println!("Readiness: {}", color_status(ready));
            if let Some(reason) = &readiness.reason {
                println!("Reason:    {}", reason);
            }
            println!();

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, c)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&status_label(c.status)),
                    failures: c.consecutive_failures,
                    message: c.message.clone().unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
