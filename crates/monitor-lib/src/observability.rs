//! Observability infrastructure for the monitor
//!
//! Provides:
//! - Prometheus metrics (tick latency, tick failures, deliveries, counter resets)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for tick latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    tick_latency_seconds: Histogram,
    ticks_total: IntCounter,
    tick_failures: IntCounterVec,
    sink_failures: IntCounterVec,
    sink_successes: IntCounterVec,
    counter_resets: IntCounter,
    tracked_identities: IntGauge,
    containers_monitored: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            tick_latency_seconds: register_histogram!(
                "resource_monitor_tick_latency_seconds",
                "Time spent sampling sources and assembling one report",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            ticks_total: register_int_counter!(
                "resource_monitor_ticks_total",
                "Total number of poll ticks started"
            )
            .expect("Failed to register ticks_total"),

            tick_failures: register_int_counter_vec!(
                "resource_monitor_tick_failures_total",
                "Ticks aborted because a metric source failed",
                &["source"]
            )
            .expect("Failed to register tick_failures"),

            sink_failures: register_int_counter_vec!(
                "resource_monitor_sink_failures_total",
                "Reports a sink failed to render or deliver",
                &["sink"]
            )
            .expect("Failed to register sink_failures"),

            sink_successes: register_int_counter_vec!(
                "resource_monitor_sink_successes_total",
                "Reports a sink rendered or delivered",
                &["sink"]
            )
            .expect("Failed to register sink_successes"),

            counter_resets: register_int_counter!(
                "resource_monitor_counter_resets_total",
                "Identities skipped because a counter went backwards"
            )
            .expect("Failed to register counter_resets"),

            tracked_identities: register_int_gauge!(
                "resource_monitor_tracked_identities",
                "CPU scopes and interfaces held in the rate engine state"
            )
            .expect("Failed to register tracked_identities"),

            containers_monitored: register_int_gauge!(
                "resource_monitor_containers_monitored",
                "Number of containers in the last report"
            )
            .expect("Failed to register containers_monitored"),
        }
    }
}

/// Handle to the global monitor metrics
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_tick_latency(&self, duration_secs: f64) {
        self.inner().tick_latency_seconds.observe(duration_secs);
    }

    pub fn inc_ticks(&self) {
        self.inner().ticks_total.inc();
    }

    pub fn inc_tick_failures(&self, source: &str) {
        self.inner()
            .tick_failures
            .with_label_values(&[source])
            .inc();
    }

    pub fn inc_sink_failures(&self, sink: &str) {
        self.inner().sink_failures.with_label_values(&[sink]).inc();
    }

    pub fn inc_sink_successes(&self, sink: &str) {
        self.inner().sink_successes.with_label_values(&[sink]).inc();
    }

    pub fn add_counter_resets(&self, count: u64) {
        self.inner().counter_resets.inc_by(count);
    }

    pub fn set_tracked_identities(&self, count: i64) {
        self.inner().tracked_identities.set(count);
    }

    pub fn set_containers_monitored(&self, count: i64) {
        self.inner().containers_monitored.set(count);
    }

    /// Encode every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> Result<Vec<u8>, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Structured logger for monitor events
#[derive(Clone)]
pub struct StructuredLogger {
    host_name: String,
}

impl StructuredLogger {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, interval_secs: u64, webhook: bool) {
        info!(
            event = "monitor_started",
            host = %self.host_name,
            version = %version,
            interval_secs = interval_secs,
            webhook = webhook,
            "Resource monitor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            host = %self.host_name,
            reason = %reason,
            "Resource monitor shutting down"
        );
    }

    /// A source failed and the tick was abandoned
    pub fn log_tick_failed(&self, source: &str, error: &str) {
        warn!(
            event = "tick_failed",
            host = %self.host_name,
            source = %source,
            error = %error,
            "Report generation failed, retrying next tick"
        );
    }

    pub fn log_sink_failed(&self, sink: &str, error: &str) {
        warn!(
            event = "delivery_failed",
            host = %self.host_name,
            sink = %sink,
            error = %error,
            "Sink failed, report dropped"
        );
    }

    pub fn log_counter_reset(&self, detail: &str) {
        info!(
            event = "counter_reset",
            host = %self.host_name,
            detail = %detail,
            "Counter went backwards, no rate this tick"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_metrics_creation() {
        let metrics = MonitorMetrics::new();
        let again = MonitorMetrics::new();

        metrics.observe_tick_latency(0.01);
        metrics.inc_ticks();
        metrics.inc_tick_failures("procfs");
        again.inc_sink_failures("webhook");
        again.inc_sink_successes("console");
        again.add_counter_resets(2);
        metrics.set_tracked_identities(5);
        metrics.set_containers_monitored(3);
    }

    #[test]
    fn test_encode_text_includes_monitor_metrics() {
        let metrics = MonitorMetrics::new();
        metrics.inc_ticks();

        let text = String::from_utf8(metrics.encode_text().unwrap()).unwrap();

        assert!(text.contains("resource_monitor_ticks_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-host");
        assert_eq!(logger.host_name, "test-host");
    }
}
