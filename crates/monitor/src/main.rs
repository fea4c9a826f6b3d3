//! Resource Monitor - host and container resource monitor
//!
//! Samples CPU, memory, network, disk and container usage on a fixed
//! interval, renders each report to the console and posts container stats
//! to a webhook.

use anyhow::Result;
use monitor_lib::{
    api,
    health::{components, HealthRegistry},
    observability::{MonitorMetrics, StructuredLogger},
    poller::PollLoopBuilder,
    sink::{ConsoleRenderer, WebhookPublisher},
    source::{DockerClient, ProcSource, SystemSource},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr; stdout belongs to the console renderer
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("Starting resource-monitor");

    let config = config::MonitorConfig::load()?;
    info!(
        host_name = %config.host_name,
        interval_secs = config.interval_secs,
        containers = config.containers,
        "Monitor configured"
    );

    let logger = StructuredLogger::new(&config.host_name);

    // Container runtime client; failure here is fatal
    let docker = if config.containers {
        Some(DockerClient::from_env().await?)
    } else {
        None
    };
    let source = Arc::new(SystemSource::new(ProcSource::new(&config.proc_root), docker));

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SOURCES).await;

    let metrics = MonitorMetrics::new();

    let mut builder = PollLoopBuilder::new()
        .source(source)
        .interval(config.interval())
        .eviction_grace_ticks(config.eviction_grace_ticks)
        .health(health_registry.clone())
        .logger(logger.clone());

    if config.console {
        health_registry.register(components::CONSOLE).await;
        builder = builder.sink(Arc::new(ConsoleRenderer::stdout()));
    }
    if let Some(url) = &config.webhook_url {
        health_registry.register(components::WEBHOOK).await;
        let publisher = WebhookPublisher::new(url, config.webhook_timeout())?;
        builder = builder.sink(Arc::new(publisher));
    }
    let poll_loop = builder.build()?;

    // Health and metrics server
    let api_handle = if config.api_port != 0 {
        let listener = api::bind(config.api_port).await?;
        let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
        Some(tokio::spawn(async move {
            if let Err(e) = api::serve(listener, app_state).await {
                error!(error = %e, "API server stopped");
            }
        }))
    } else {
        None
    };

    logger.log_startup(
        MONITOR_VERSION,
        config.interval_secs,
        config.webhook_url.is_some(),
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let poll_handle = tokio::spawn(poll_loop.run(shutdown_rx));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    if let Err(e) = poll_handle.await {
        error!(error = %e, "Poll loop task failed");
    }
    if let Some(handle) = api_handle {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}
