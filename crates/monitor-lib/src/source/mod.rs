//! Metric source adapters
//!
//! Point-in-time queries against the host and the container runtime. Sources
//! keep no state between calls; turning counters into rates is the job of
//! [`crate::rate`].

mod disk;
mod docker;
mod procfs;


pub use disk::sample_disks;
pub use docker::{
    negotiate_version, parse_docker_host, DockerClient, DEFAULT_DOCKER_HOST, MAX_API_VERSION,
};
pub use procfs::ProcSource;

use crate::error::SourceError;
use crate::models::{ContainerSample, DiskSample, MemorySample};
use crate::rate::CounterSnapshot;

use async_trait::async_trait;

/// Trait for point-in-time metric queries
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// `[busy, total]` CPU time counters per CPU scope
    async fn sample_cpu(&self) -> Result<Vec<CounterSnapshot>, SourceError>;

    async fn sample_memory(&self) -> Result<MemorySample, SourceError>;

    /// `[received_bytes, sent_bytes]` counters per interface
    async fn sample_network(&self) -> Result<Vec<CounterSnapshot>, SourceError>;

    async fn sample_disk(&self) -> Result<Vec<DiskSample>, SourceError>;

    /// One reading per running container; empty when no runtime is attached
    async fn sample_containers(&self) -> Result<Vec<ContainerSample>, SourceError>;
}

/// Host metrics from procfs and sysinfo, containers from Docker
#[derive(Debug, Clone, Default)]
pub struct SystemSource {
    proc: ProcSource,
    docker: Option<DockerClient>,
}

impl SystemSource {
    pub fn new(proc: ProcSource, docker: Option<DockerClient>) -> Self {
        Self { proc, docker }
    }

    pub fn has_container_runtime(&self) -> bool {
        self.docker.is_some()
    }
}

#[async_trait]
impl MetricSource for SystemSource {
    async fn sample_cpu(&self) -> Result<Vec<CounterSnapshot>, SourceError> {
        self.proc.cpu_snapshots().await
    }

    async fn sample_memory(&self) -> Result<MemorySample, SourceError> {
        self.proc.memory().await
    }

    async fn sample_network(&self) -> Result<Vec<CounterSnapshot>, SourceError> {
        self.proc.network_snapshots().await
    }

    async fn sample_disk(&self) -> Result<Vec<DiskSample>, SourceError> {
        sample_disks().await
    }

    async fn sample_containers(&self) -> Result<Vec<ContainerSample>, SourceError> {
        match &self.docker {
            Some(docker) => docker.sample_containers().await,
            None => Ok(Vec::new()),
        }
    }
}
