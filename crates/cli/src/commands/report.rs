//! One-shot report command

use anyhow::Result;
use monitor_lib::{
    report::{PollState, ReportAssembler},
    sink::render_report,
    source::{DockerClient, ProcSource, SystemSource},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::output::{print_json, print_warning, OutputFormat};

/// Sample twice `interval_ms` apart and print the second report
pub async fn show_report(
    interval_ms: u64,
    containers: bool,
    proc_root: PathBuf,
    format: OutputFormat,
) -> Result<()> {
    let docker = if containers {
        match DockerClient::from_env().await {
            Ok(client) => Some(client),
            Err(e) => {
                print_warning(&format!("Containers skipped: {}", e));
                None
            }
        }
    } else {
        None
    };

    let source = Arc::new(SystemSource::new(ProcSource::new(proc_root), docker));
    let assembler = ReportAssembler::new(source);

    // Rates need two samples
    let first = assembler.generate(&PollState::default()).await?;
    tokio::time::sleep(Duration::from_millis(interval_ms)).await;
    let second = assembler.generate(&first.state).await?;

    for error in &second.malformed {
        print_warning(&error.to_string());
    }

    match format {
        OutputFormat::Json => print_json(&second.report)?,
        OutputFormat::Table => print!("{}", render_report(&second.report)),
    }

    Ok(())
}
