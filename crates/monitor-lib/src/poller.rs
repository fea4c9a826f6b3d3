//! Poll loop
//!
//! Drives one tick at a time: sample sources, compute rates, hand the report
//! to every sink, then sleep for the fixed interval. Ticks never overlap and
//! a late tick is not made up for.

use crate::error::SourceError;
use crate::health::{components, HealthRegistry};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::rate::RetentionPolicy;
use crate::report::{PollState, ReportAssembler};
use crate::sink::ReportSink;
use crate::source::MetricSource;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

/// Configuration for the poll loop
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Sleep between the end of one tick and the start of the next (default: 1 second)
    pub interval: Duration,
    /// Retention of vanished identities (default: drop immediately)
    pub retention: RetentionPolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            retention: RetentionPolicy::default(),
        }
    }
}

/// What happened during a successful tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub sinks_succeeded: usize,
    pub sinks_failed: usize,
    pub counter_resets: usize,
}

/// Periodic sampler owning the retained counter state
pub struct PollLoop {
    assembler: ReportAssembler,
    sinks: Vec<Arc<dyn ReportSink>>,
    config: PollConfig,
    state: PollState,
    health: HealthRegistry,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
}

impl PollLoop {
    pub fn new(
        source: Arc<dyn MetricSource>,
        sinks: Vec<Arc<dyn ReportSink>>,
        config: PollConfig,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        let state = PollState::new(config.retention);
        Self {
            assembler: ReportAssembler::new(source),
            sinks,
            config,
            state,
            health,
            metrics: MonitorMetrics::new(),
            logger,
        }
    }

    /// Counter state retained from the last successful tick
    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Run until a shutdown message arrives
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            sinks = self.sinks.len(),
            "Starting poll loop"
        );

        loop {
            // Errors are logged and counted inside tick; the loop always continues
            let _ = self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down poll loop");
                    break;
                }
            }
        }
    }

    /// Execute one complete sample → compute → publish cycle
    pub async fn tick(&mut self) -> Result<TickSummary, SourceError> {
        let start = Instant::now();
        self.metrics.inc_ticks();

        let assembly = match self.assembler.generate(&self.state).await {
            Ok(assembly) => assembly,
            Err(e) => {
                let source = e.source_name();
                self.metrics.inc_tick_failures(source);
                self.logger.log_tick_failed(source, &e.to_string());
                self.health
                    .record_failure(components::SOURCES, e.to_string())
                    .await;
                return Err(e);
            }
        };
        self.metrics
            .observe_tick_latency(start.elapsed().as_secs_f64());

        self.state = assembly.state;
        self.health.record_success(components::SOURCES).await;
        self.health.mark_report_produced().await;

        for error in &assembly.malformed {
            self.logger.log_counter_reset(&error.to_string());
        }
        self.metrics
            .add_counter_resets(assembly.malformed.len() as u64);
        self.metrics
            .set_tracked_identities(self.state.tracked_identities() as i64);
        self.metrics
            .set_containers_monitored(assembly.report.containers.len() as i64);

        let mut summary = TickSummary {
            counter_resets: assembly.malformed.len(),
            ..TickSummary::default()
        };

        for sink in &self.sinks {
            match sink.consume(&assembly.report).await {
                Ok(()) => {
                    summary.sinks_succeeded += 1;
                    self.metrics.inc_sink_successes(sink.name());
                    self.health.record_success(sink.name()).await;
                }
                Err(e) => {
                    summary.sinks_failed += 1;
                    self.metrics.inc_sink_failures(sink.name());
                    self.logger.log_sink_failed(sink.name(), &e.to_string());
                    self.health.record_failure(sink.name(), e.to_string()).await;
                }
            }
        }

        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            sinks_succeeded = summary.sinks_succeeded,
            sinks_failed = summary.sinks_failed,
            "Tick complete"
        );

        Ok(summary)
    }
}

/// Builder for creating the poll loop
pub struct PollLoopBuilder {
    source: Option<Arc<dyn MetricSource>>,
    sinks: Vec<Arc<dyn ReportSink>>,
    config: PollConfig,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
}

impl PollLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            source: None,
            sinks: Vec::new(),
            config: PollConfig::default(),
            health: None,
            logger: None,
        }
    }

    /// Set the metric source
    pub fn source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Add a sink; sinks run in the order they were added
    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Set the poll interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Keep vanished identities for this many ticks
    pub fn eviction_grace_ticks(mut self, ticks: u32) -> Self {
        self.config.retention = RetentionPolicy { grace_ticks: ticks };
        self
    }

    /// Set the health registry shared with the API server
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Set the structured logger
    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the poll loop
    pub fn build(self) -> Result<PollLoop> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Metric source is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Poll interval must be greater than zero");
        }

        Ok(PollLoop::new(
            source,
            self.sinks,
            self.config,
            self.health.unwrap_or_default(),
            self.logger
                .unwrap_or_else(|| StructuredLogger::new("localhost")),
        ))
    }
}

impl Default for PollLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
