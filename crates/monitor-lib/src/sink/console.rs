//! Console rendering of reports
//!
//! Clears the terminal and prints the report as tables. The output is meant
//! for people and is not a stable format.

use super::ReportSink;
use crate::error::SinkError;
use crate::models::Report;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Mutex;
use tabled::{settings::Style, Table, Tabled};

/// ANSI: erase display, cursor home
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Tabled)]
struct CpuRow {
    #[tabled(rename = "CPU")]
    identity: String,
    #[tabled(rename = "Utilization")]
    utilization: String,
}

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "Received")]
    received: String,
    #[tabled(rename = "Sent")]
    sent: String,
}

#[derive(Tabled)]
struct DiskRow {
    #[tabled(rename = "Mount")]
    mount: String,
    #[tabled(rename = "Total")]
    total: String,
    #[tabled(rename = "Free")]
    free: String,
}

#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Container")]
    name: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec.round() as u64))
}

fn table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Render a report as text
pub fn render_report(report: &Report) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Report at {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Logical CPUs: {}", report.logical_cpus);
    let _ = writeln!(
        out,
        "Memory: {} total, {} free, {:.1}% used",
        format_bytes(report.memory.total),
        format_bytes(report.memory.free),
        report.memory.used_percent
    );
    out.push('\n');

    if report.cpu.is_empty() {
        out.push_str("CPU: waiting for a second sample\n");
    } else {
        let rows = report
            .cpu
            .iter()
            .map(|c| CpuRow {
                identity: c.identity.clone(),
                utilization: format!("{:.1}%", c.utilization),
            })
            .collect();
        let _ = writeln!(out, "{}", table::<CpuRow>(rows));
    }

    if report.network.is_empty() {
        out.push_str("Network: waiting for a second sample\n");
    } else {
        let rows = report
            .network
            .iter()
            .map(|n| NetworkRow {
                interface: n.interface.clone(),
                received: format_rate(n.received_per_sec),
                sent: format_rate(n.sent_per_sec),
            })
            .collect();
        let _ = writeln!(out, "{}", table::<NetworkRow>(rows));
    }

    if !report.disks.is_empty() {
        let rows = report
            .disks
            .iter()
            .map(|d| DiskRow {
                mount: d.mount.clone(),
                total: format_bytes(d.total_bytes),
                free: format_bytes(d.free_bytes),
            })
            .collect();
        let _ = writeln!(out, "{}", table::<DiskRow>(rows));
    }

    if !report.containers.is_empty() {
        let rows = report
            .containers
            .iter()
            .map(|c| ContainerRow {
                name: c.container_name.clone(),
                cpu: format!("{:.2}%", c.stats.cpu_usage),
                memory: format_bytes(c.stats.memory_usage),
            })
            .collect();
        let _ = writeln!(out, "{}", table::<ContainerRow>(rows));
    }

    out
}

/// Sink that clears the terminal and prints each report
pub struct ConsoleRenderer {
    out: Mutex<Box<dyn Write + Send>>,
    clear_screen: bool,
}

impl ConsoleRenderer {
    /// Render to stdout, clearing the screen before each report
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()), true)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, clear_screen: bool) -> Self {
        Self {
            out: Mutex::new(out),
            clear_screen,
        }
    }

    fn write(&self, text: &str) -> std::io::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| std::io::Error::other("console writer poisoned"))?;
        if self.clear_screen {
            out.write_all(CLEAR_SCREEN.as_bytes())?;
        }
        out.write_all(text.as_bytes())?;
        out.flush()
    }
}

#[async_trait]
impl ReportSink for ConsoleRenderer {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn consume(&self, report: &Report) -> Result<(), SinkError> {
        let text = render_report(report);
        self.write(&text)?;
        Ok(())
    }
}
