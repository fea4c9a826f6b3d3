//! Core data models for the resource monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative busy/total CPU time for one scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

/// Two CPU readings for the same container, as returned in a single
/// runtime stats response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshotPair {
    pub previous: CpuTimes,
    pub current: CpuTimes,
}

/// Host memory at one instant, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    pub used_percent: f64,
}

/// Capacity of one mounted filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSample {
    pub mount: String,
    pub total_bytes: u64,
    pub free_bytes: u64,
}

/// Raw container reading from the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSample {
    pub id: String,
    pub name: String,
    pub cpu: CpuSnapshotPair,
    pub online_cpus: u32,
    pub memory_usage: u64,
}

/// Utilization of one CPU scope (`cpu` for the aggregate, `cpuN` per core)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub identity: String,
    pub utilization: f64,
}

/// Network throughput of one interface, bytes per second
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkUsage {
    pub interface: String,
    pub received_per_sec: f64,
    pub sent_per_sec: f64,
}

/// Container usage as published to the webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerUsage {
    pub memory_usage: u64,
    pub cpu_usage: f64,
}

/// One element of the webhook payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStat {
    pub container_name: String,
    pub stats: ContainerUsage,
}

/// Everything observed during one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub logical_cpus: usize,
    pub cpu: Vec<CpuUsage>,
    pub memory: MemorySample,
    pub network: Vec<NetworkUsage>,
    pub disks: Vec<DiskSample>,
    pub containers: Vec<ContainerStat>,
}
