//! Report assembly
//!
//! Queries every source once, runs the rate engine against the retained
//! state and composes a [`Report`]. A failed query aborts the whole tick and
//! leaves the caller's state untouched.

use crate::error::{CounterError, SourceError};
use crate::models::{ContainerStat, ContainerUsage, NetworkUsage, Report};
use crate::rate::{
    compute_cpu_usage, compute_rates, container_cpu_percent, RateEngineState, RetentionPolicy,
};
use crate::source::MetricSource;
use chrono::Utc;
use std::sync::Arc;

/// Label of the aggregate line in the CPU snapshots
pub const AGGREGATE_CPU: &str = "cpu";

/// Counter state retained between ticks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollState {
    pub cpu: RateEngineState,
    pub network: RateEngineState,
}

impl PollState {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            cpu: RateEngineState::with_retention(retention),
            network: RateEngineState::with_retention(retention),
        }
    }

    /// Number of identities currently retained across all engines
    pub fn tracked_identities(&self) -> usize {
        self.cpu.len() + self.network.len()
    }
}

/// Result of a successful tick
#[derive(Debug, Clone)]
pub struct Assembly {
    pub report: Report,
    /// State to retain for the next tick
    pub state: PollState,
    /// Identities degraded to "no data" this tick
    pub malformed: Vec<CounterError>,
}

/// Builds one report per tick from a metric source
#[derive(Clone)]
pub struct ReportAssembler {
    source: Arc<dyn MetricSource>,
}

impl ReportAssembler {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self { source }
    }

    /// Sample everything and compute rates against `state`
    pub async fn generate(&self, state: &PollState) -> Result<Assembly, SourceError> {
        let cpu_snapshots = self.source.sample_cpu().await?;
        let memory = self.source.sample_memory().await?;
        let network_snapshots = self.source.sample_network().await?;
        let disks = self.source.sample_disk().await?;
        let container_samples = self.source.sample_containers().await?;

        let logical_cpus = match cpu_snapshots
            .iter()
            .filter(|s| s.identity != AGGREGATE_CPU)
            .count()
        {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };

        let (cpu, cpu_pass) = compute_cpu_usage(&state.cpu, cpu_snapshots);
        let network_pass = compute_rates(&state.network, network_snapshots);

        let mut malformed: Vec<CounterError> = cpu_pass
            .malformed()
            .chain(network_pass.malformed())
            .cloned()
            .collect();

        let network = network_pass
            .samples
            .iter()
            .filter_map(|sample| match sample.rates.as_slice() {
                [received, sent] => Some(NetworkUsage {
                    interface: sample.identity.clone(),
                    received_per_sec: *received,
                    sent_per_sec: *sent,
                }),
                _ => None,
            })
            .collect();

        let containers = container_samples
            .into_iter()
            .map(|sample| {
                let cpu_usage = container_cpu_percent(&sample.name, &sample.cpu, sample.online_cpus)
                    .unwrap_or_else(|e| {
                        malformed.push(e);
                        0.0
                    });
                ContainerStat {
                    container_name: sample.name,
                    stats: ContainerUsage {
                        memory_usage: sample.memory_usage,
                        cpu_usage,
                    },
                }
            })
            .collect();

        Ok(Assembly {
            report: Report {
                generated_at: Utc::now(),
                logical_cpus,
                cpu,
                memory,
                network,
                disks,
                containers,
            },
            state: PollState {
                cpu: cpu_pass.state,
                network: network_pass.state,
            },
            malformed,
        })
    }
}
