//! Rate sampling engine
//!
//! Converts consecutive cumulative counter snapshots into per-second rates
//! and CPU percentages. The engine keeps no state of its own: callers pass the
//! [`RateEngineState`] returned by the previous call and keep the new one.
//!
//! Handling of awkward inputs:
//! - an identity seen for the first time yields no sample but seeds the state
//! - a counter that went backwards (reset, wraparound, restart) yields no
//!   sample for that tick, never a negative rate
//! - zero or negative elapsed time yields no sample instead of a division
//! - an identity missing from the current snapshot set is dropped, unless a
//!   [`RetentionPolicy`] grace period keeps it for a few ticks

#[cfg(test)]
mod tests;

use crate::error::CounterError;
use crate::models::{CpuSnapshotPair, CpuUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cumulative counters for one identity at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Interface name, CPU label or container id
    pub identity: String,
    /// Monotonically non-decreasing counters
    pub counters: Vec<u64>,
    pub captured_at: DateTime<Utc>,
}

impl CounterSnapshot {
    pub fn new(
        identity: impl Into<String>,
        counters: Vec<u64>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity: identity.into(),
            counters,
            captured_at,
        }
    }
}

/// Per-second rates derived from two snapshots of one identity
///
/// Only valid samples are ever produced; an identity without a usable pair of
/// snapshots shows up in [`RateComputation::skipped`] instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSample {
    pub identity: String,
    /// Counter increase since the previous snapshot, one per counter
    pub deltas: Vec<u64>,
    /// `deltas[i] / elapsed_secs`
    pub rates: Vec<f64>,
    pub elapsed_secs: f64,
}

/// Why an identity produced no sample this tick
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    FirstObservation,
    Malformed(CounterError),
    NonPositiveElapsed,
}

/// An identity that produced no sample
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub identity: String,
    pub reason: SkipReason,
}

/// How long a vanished identity is remembered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Number of consecutive ticks an identity may be missing before its last
    /// snapshot is evicted. Zero evicts immediately.
    pub grace_ticks: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct Retained {
    snapshot: CounterSnapshot,
    missed_ticks: u32,
}

/// Last snapshot per identity, carried from one tick to the next
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateEngineState {
    entries: BTreeMap<String, Retained>,
    retention: RetentionPolicy,
}

impl RateEngineState {
    /// Empty state with immediate eviction
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty state with the given retention policy
    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            entries: BTreeMap::new(),
            retention,
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Last retained snapshot for an identity
    pub fn get(&self, identity: &str) -> Option<&CounterSnapshot> {
        self.entries.get(identity).map(|r| &r.snapshot)
    }

    /// Identities currently retained, sorted
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Output of one engine pass
#[derive(Debug, Clone)]
pub struct RateComputation {
    /// Valid samples in the order the identities appeared in the input
    pub samples: Vec<RateSample>,
    pub skipped: Vec<Skipped>,
    /// State to pass to the next call
    pub state: RateEngineState,
}

impl RateComputation {
    pub fn sample(&self, identity: &str) -> Option<&RateSample> {
        self.samples.iter().find(|s| s.identity == identity)
    }

    /// Skipped identities whose counters were malformed
    pub fn malformed(&self) -> impl Iterator<Item = &CounterError> {
        self.skipped.iter().filter_map(|s| match &s.reason {
            SkipReason::Malformed(e) => Some(e),
            _ => None,
        })
    }
}

/// Compute rates for every identity present in both `previous` and `current`
pub fn compute_rates(previous: &RateEngineState, current: Vec<CounterSnapshot>) -> RateComputation {
    let mut samples = Vec::with_capacity(current.len());
    let mut skipped = Vec::new();
    let mut entries = BTreeMap::new();

    for snapshot in current {
        match previous.get(&snapshot.identity) {
            None => skipped.push(Skipped {
                identity: snapshot.identity.clone(),
                reason: SkipReason::FirstObservation,
            }),
            Some(earlier) => match rate_between(earlier, &snapshot) {
                Ok(sample) => samples.push(sample),
                Err(reason) => skipped.push(Skipped {
                    identity: snapshot.identity.clone(),
                    reason,
                }),
            },
        }

        entries.insert(
            snapshot.identity.clone(),
            Retained {
                snapshot,
                missed_ticks: 0,
            },
        );
    }

    for (identity, retained) in &previous.entries {
        if entries.contains_key(identity) {
            continue;
        }
        if retained.missed_ticks < previous.retention.grace_ticks {
            entries.insert(
                identity.clone(),
                Retained {
                    snapshot: retained.snapshot.clone(),
                    missed_ticks: retained.missed_ticks + 1,
                },
            );
        }
    }

    RateComputation {
        samples,
        skipped,
        state: RateEngineState {
            entries,
            retention: previous.retention,
        },
    }
}

fn rate_between(
    previous: &CounterSnapshot,
    current: &CounterSnapshot,
) -> Result<RateSample, SkipReason> {
    let deltas = counter_deltas(previous, current).map_err(SkipReason::Malformed)?;

    let elapsed_secs = (current.captured_at - previous.captured_at)
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or(0.0);
    if elapsed_secs <= 0.0 {
        return Err(SkipReason::NonPositiveElapsed);
    }

    let rates = deltas.iter().map(|d| *d as f64 / elapsed_secs).collect();

    Ok(RateSample {
        identity: current.identity.clone(),
        deltas,
        rates,
        elapsed_secs,
    })
}

fn counter_deltas(
    previous: &CounterSnapshot,
    current: &CounterSnapshot,
) -> Result<Vec<u64>, CounterError> {
    if previous.counters.len() != current.counters.len() {
        return Err(CounterError::ShapeChanged {
            identity: current.identity.clone(),
            previous: previous.counters.len(),
            current: current.counters.len(),
        });
    }

    previous
        .counters
        .iter()
        .zip(&current.counters)
        .enumerate()
        .map(|(index, (before, after))| {
            after
                .checked_sub(*before)
                .ok_or_else(|| CounterError::Decreased {
                    identity: current.identity.clone(),
                    index,
                    previous: *before,
                    current: *after,
                })
        })
        .collect()
}

/// CPU utilization from busy/total time deltas
///
/// `(busy / total) * core_count * 100`, clamped to `[0, 100 * core_count]`.
/// A zero total delta yields 0.
pub fn cpu_percent(busy_delta: u64, total_delta: u64, core_count: u32) -> f64 {
    if total_delta == 0 {
        return 0.0;
    }
    let cores = f64::from(core_count);
    let percent = busy_delta as f64 / total_delta as f64 * cores * 100.0;
    percent.clamp(0.0, 100.0 * cores)
}

/// CPU utilization of a container from the pair of readings in one stats
/// response
pub fn container_cpu_percent(
    identity: &str,
    pair: &CpuSnapshotPair,
    online_cpus: u32,
) -> Result<f64, CounterError> {
    let busy = pair
        .current
        .busy
        .checked_sub(pair.previous.busy)
        .ok_or_else(|| CounterError::Decreased {
            identity: identity.to_string(),
            index: 0,
            previous: pair.previous.busy,
            current: pair.current.busy,
        })?;
    let total = pair
        .current
        .total
        .checked_sub(pair.previous.total)
        .ok_or_else(|| CounterError::Decreased {
            identity: identity.to_string(),
            index: 1,
            previous: pair.previous.total,
            current: pair.current.total,
        })?;

    Ok(cpu_percent(busy, total, online_cpus))
}

/// Host CPU utilization from `[busy, total]` counter snapshots
///
/// Each identity is a percentage of its own capacity, so the aggregate `cpu`
/// row and the per-core rows are all in `[0, 100]`.
pub fn compute_cpu_usage(
    previous: &RateEngineState,
    current: Vec<CounterSnapshot>,
) -> (Vec<CpuUsage>, RateComputation) {
    let computation = compute_rates(previous, current);

    let usage = computation
        .samples
        .iter()
        .filter_map(|sample| match sample.deltas.as_slice() {
            [busy, total] => Some(CpuUsage {
                identity: sample.identity.clone(),
                utilization: cpu_percent(*busy, *total, 1),
            }),
            _ => None,
        })
        .collect();

    (usage, computation)
}
