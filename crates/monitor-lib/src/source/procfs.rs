//! Host metrics from the Linux proc filesystem
//!
//! Reads:
//! - /proc/stat for cumulative CPU time, aggregate and per core
//! - /proc/meminfo for memory totals
//! - /proc/net/dev for per-interface byte counters

use crate::error::SourceError;
use crate::models::MemorySample;
use crate::rate::CounterSnapshot;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Reader for CPU, memory and network counters under a proc root
#[derive(Debug, Clone)]
pub struct ProcSource {
    proc_root: PathBuf,
}

impl Default for ProcSource {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcSource {
    /// Create a reader rooted at `proc_root` (normally `/proc`)
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    async fn read(&self, relative: &str) -> Result<(PathBuf, String), SourceError> {
        let path = self.proc_root.join(relative);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|source| SourceError::Read {
                path: path.clone(),
                source,
            })?;
        Ok((path, content))
    }

    /// `[busy, total]` jiffies for the aggregate `cpu` line and every `cpuN` line
    pub async fn cpu_snapshots(&self) -> Result<Vec<CounterSnapshot>, SourceError> {
        let (path, content) = self.read("stat").await?;
        let captured_at = Utc::now();
        Self::parse_stat(&content, captured_at).map_err(|detail| SourceError::Parse { path, detail })
    }

    pub async fn memory(&self) -> Result<MemorySample, SourceError> {
        let (path, content) = self.read("meminfo").await?;
        Self::parse_meminfo(&content).map_err(|detail| SourceError::Parse { path, detail })
    }

    /// `[received_bytes, sent_bytes]` per interface
    pub async fn network_snapshots(&self) -> Result<Vec<CounterSnapshot>, SourceError> {
        let (path, content) = self.read("net/dev").await?;
        let captured_at = Utc::now();
        Self::parse_net_dev(&content, captured_at)
            .map_err(|detail| SourceError::Parse { path, detail })
    }

    /// Parse /proc/stat contents
    ///
    /// Fields after the label: user nice system idle iowait irq softirq steal
    /// guest guest_nice. Guest time is already included in user/nice, so the
    /// total is the sum of the first eight; idle time is idle + iowait.
    pub fn parse_stat(
        content: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<Vec<CounterSnapshot>, String> {
        let mut snapshots = Vec::new();

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let Some(label) = parts.next() else {
                continue;
            };
            if !label.starts_with("cpu") {
                continue;
            }

            let values: Vec<u64> = parts
                .take(8)
                .map(|v| v.parse::<u64>())
                .collect::<Result<_, _>>()
                .map_err(|e| format!("invalid value on '{}' line: {}", label, e))?;

            if values.len() < 4 {
                return Err(format!("'{}' line has only {} fields", label, values.len()));
            }

            let total = values
                .iter()
                .try_fold(0u64, |acc, v| acc.checked_add(*v))
                .ok_or_else(|| format!("'{}' line overflows the total", label))?;
            let idle = values[3]
                .checked_add(values.get(4).copied().unwrap_or(0))
                .ok_or_else(|| format!("'{}' line overflows idle time", label))?;
            let busy = total.saturating_sub(idle);

            snapshots.push(CounterSnapshot::new(label, vec![busy, total], captured_at));
        }

        if snapshots.is_empty() {
            return Err("no cpu lines found".to_string());
        }

        Ok(snapshots)
    }

    /// Parse /proc/meminfo contents into bytes
    pub fn parse_meminfo(content: &str) -> Result<MemorySample, String> {
        let mut fields: HashMap<&str, u64> = HashMap::new();

        for line in content.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let mut parts = rest.split_whitespace();
            if let Some(Ok(value)) = parts.next().map(str::parse::<u64>) {
                let bytes = match parts.next() {
                    Some("kB") => value
                        .checked_mul(1024)
                        .ok_or_else(|| format!("{} overflows in bytes", key.trim()))?,
                    _ => value,
                };
                fields.insert(key.trim(), bytes);
            }
        }

        let total = *fields.get("MemTotal").ok_or("MemTotal missing")?;
        let free = *fields.get("MemFree").ok_or("MemFree missing")?;
        // Kernels before 3.14 lack MemAvailable
        let available = match fields.get("MemAvailable") {
            Some(available) => *available,
            None => free
                .checked_add(fields.get("Buffers").copied().unwrap_or(0))
                .and_then(|v| v.checked_add(fields.get("Cached").copied().unwrap_or(0)))
                .ok_or("available memory overflows")?,
        };

        let used_percent = if total > 0 {
            total.saturating_sub(available) as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        Ok(MemorySample {
            total,
            free,
            available,
            used_percent,
        })
    }

    /// Parse /proc/net/dev contents
    ///
    /// ```text
    /// Inter-|   Receive                            |  Transmit
    ///  face |bytes    packets errs drop fifo frame compressed multicast|bytes ...
    ///   eth0: 12345678   12345    0    0    0     0          0         0 87654321 ...
    /// ```
    pub fn parse_net_dev(
        content: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<Vec<CounterSnapshot>, String> {
        let mut snapshots = Vec::new();

        for line in content.lines().skip(2) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (interface, rest) = line
                .split_once(':')
                .ok_or_else(|| format!("invalid format at line '{}'", line))?;
            let interface = interface.trim();

            let values: Vec<u64> = rest
                .split_whitespace()
                .filter_map(|s| s.parse::<u64>().ok())
                .collect();

            if values.len() < 16 {
                debug!(
                    interface = %interface,
                    field_count = values.len(),
                    "Skipping interface with incomplete stats"
                );
                continue;
            }

            snapshots.push(CounterSnapshot::new(
                interface,
                vec![values[0], values[8]],
                captured_at,
            ));
        }

        Ok(snapshots)
    }
}
