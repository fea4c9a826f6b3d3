//! Tests for the rate sampling engine

use super::*;
use chrono::{Duration, TimeZone};

fn at(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::milliseconds(millis)
}

fn snap(identity: &str, counters: &[u64], millis: i64) -> CounterSnapshot {
    CounterSnapshot::new(identity, counters.to_vec(), at(millis))
}

fn seeded(snapshots: Vec<CounterSnapshot>) -> RateEngineState {
    compute_rates(&RateEngineState::new(), snapshots).state
}

#[test]
fn test_first_tick_yields_no_samples_but_seeds_state() {
    let result = compute_rates(
        &RateEngineState::new(),
        vec![snap("eth0", &[1000, 500], 0), snap("lo", &[10, 10], 0)],
    );

    assert!(result.samples.is_empty());
    assert_eq!(result.skipped.len(), 2);
    assert!(result
        .skipped
        .iter()
        .all(|s| s.reason == SkipReason::FirstObservation));
    assert_eq!(result.state.len(), 2);
    assert_eq!(result.state.get("eth0").unwrap().counters, vec![1000, 500]);
}

#[test]
fn test_network_rates_over_one_second() {
    let state = seeded(vec![snap("eth0", &[1000, 500], 0)]);

    let result = compute_rates(&state, vec![snap("eth0", &[2000, 1500], 1000)]);

    let sample = result.sample("eth0").unwrap();
    assert_eq!(sample.deltas, vec![1000, 1000]);
    assert!((sample.rates[0] - 1000.0).abs() < 1e-9);
    assert!((sample.rates[1] - 1000.0).abs() < 1e-9);
    assert!((sample.elapsed_secs - 1.0).abs() < 1e-9);
    assert!(result.skipped.is_empty());
}

#[test]
fn test_rate_uses_measured_elapsed_time() {
    let state = seeded(vec![snap("eth0", &[0], 0)]);

    // Tick arrived late: 2.5s instead of the nominal period
    let result = compute_rates(&state, vec![snap("eth0", &[5000], 2500)]);

    let sample = result.sample("eth0").unwrap();
    assert!((sample.rates[0] - 2000.0).abs() < 1e-9);
}

#[test]
fn test_unchanged_counter_yields_zero_rate() {
    let state = seeded(vec![snap("eth0", &[42, 42], 0)]);

    let result = compute_rates(&state, vec![snap("eth0", &[42, 42], 1000)]);

    assert_eq!(result.sample("eth0").unwrap().rates, vec![0.0, 0.0]);
}

#[test]
fn test_counter_decrease_is_skipped_not_negative() {
    let state = seeded(vec![snap("eth0", &[5000, 5000], 0)]);

    let result = compute_rates(&state, vec![snap("eth0", &[100, 6000], 1000)]);

    assert!(result.sample("eth0").is_none());
    assert_eq!(
        result.skipped,
        vec![Skipped {
            identity: "eth0".to_string(),
            reason: SkipReason::Malformed(CounterError::Decreased {
                identity: "eth0".to_string(),
                index: 0,
                previous: 5000,
                current: 100,
            }),
        }]
    );
    assert_eq!(result.malformed().count(), 1);
}

#[test]
fn test_counter_reset_recovers_on_next_tick() {
    let state = seeded(vec![snap("eth0", &[5000], 0)]);
    let reset = compute_rates(&state, vec![snap("eth0", &[100], 1000)]);
    assert!(reset.samples.is_empty());

    let recovered = compute_rates(&reset.state, vec![snap("eth0", &[600], 2000)]);

    let sample = recovered.sample("eth0").unwrap();
    assert!((sample.rates[0] - 500.0).abs() < 1e-9);
}

#[test]
fn test_counter_shape_change_is_malformed() {
    let state = seeded(vec![snap("eth0", &[1, 2], 0)]);

    let result = compute_rates(&state, vec![snap("eth0", &[1, 2, 3], 1000)]);

    assert!(result.samples.is_empty());
    assert!(matches!(
        result.skipped[0].reason,
        SkipReason::Malformed(CounterError::ShapeChanged {
            previous: 2,
            current: 3,
            ..
        })
    ));
}

#[test]
fn test_zero_elapsed_is_skipped() {
    let state = seeded(vec![snap("eth0", &[0], 0)]);

    let result = compute_rates(&state, vec![snap("eth0", &[100], 0)]);

    assert!(result.samples.is_empty());
    assert_eq!(result.skipped[0].reason, SkipReason::NonPositiveElapsed);
}

#[test]
fn test_clock_going_backwards_is_skipped() {
    let state = seeded(vec![snap("eth0", &[0], 1000)]);

    let result = compute_rates(&state, vec![snap("eth0", &[100], 0)]);

    assert_eq!(result.skipped[0].reason, SkipReason::NonPositiveElapsed);
}

#[test]
fn test_vanished_identity_is_dropped() {
    let state = seeded(vec![snap("eth0", &[0], 0), snap("veth1", &[0], 0)]);

    let result = compute_rates(&state, vec![snap("eth0", &[10], 1000)]);

    assert!(result.state.get("veth1").is_none());
    assert_eq!(result.state.identities().collect::<Vec<_>>(), vec!["eth0"]);
    assert!(result.sample("veth1").is_none());
}

#[test]
fn test_new_identity_mid_stream_is_seeded() {
    let state = seeded(vec![snap("eth0", &[0], 0)]);

    let result = compute_rates(
        &state,
        vec![snap("eth0", &[10], 1000), snap("wlan0", &[99], 1000)],
    );

    assert!(result.sample("eth0").is_some());
    assert!(result.sample("wlan0").is_none());
    assert_eq!(
        result.skipped,
        vec![Skipped {
            identity: "wlan0".to_string(),
            reason: SkipReason::FirstObservation,
        }]
    );
    assert!(result.state.get("wlan0").is_some());
}

#[test]
fn test_samples_follow_input_order() {
    let state = seeded(vec![
        snap("cpu", &[0, 0], 0),
        snap("cpu0", &[0, 0], 0),
        snap("cpu10", &[0, 0], 0),
        snap("cpu2", &[0, 0], 0),
    ]);

    let result = compute_rates(
        &state,
        vec![
            snap("cpu", &[1, 2], 1000),
            snap("cpu0", &[1, 2], 1000),
            snap("cpu2", &[1, 2], 1000),
            snap("cpu10", &[1, 2], 1000),
        ],
    );

    let order: Vec<_> = result.samples.iter().map(|s| s.identity.as_str()).collect();
    assert_eq!(order, vec!["cpu", "cpu0", "cpu2", "cpu10"]);
}

#[test]
fn test_grace_period_keeps_vanished_identity() {
    let state = compute_rates(
        &RateEngineState::with_retention(RetentionPolicy { grace_ticks: 1 }),
        vec![snap("eth0", &[0], 0)],
    )
    .state;

    // Missing for one tick: still retained
    let gap = compute_rates(&state, vec![]);
    assert_eq!(gap.state.get("eth0").unwrap().counters, vec![0]);

    // Reappears: rate measured against the retained snapshot
    let back = compute_rates(&gap.state, vec![snap("eth0", &[4000], 2000)]);
    let sample = back.sample("eth0").unwrap();
    assert!((sample.rates[0] - 2000.0).abs() < 1e-9);
}

#[test]
fn test_grace_period_expires() {
    let state = compute_rates(
        &RateEngineState::with_retention(RetentionPolicy { grace_ticks: 1 }),
        vec![snap("eth0", &[0], 0)],
    )
    .state;

    let first_gap = compute_rates(&state, vec![]);
    let second_gap = compute_rates(&first_gap.state, vec![]);

    assert!(second_gap.state.is_empty());
    assert_eq!(second_gap.state.retention().grace_ticks, 1);
}

#[test]
fn test_previous_state_is_not_mutated() {
    let state = seeded(vec![snap("eth0", &[0], 0)]);
    let before = state.clone();

    let _ = compute_rates(&state, vec![snap("eth1", &[5], 1000)]);

    assert_eq!(state, before);
}

#[test]
fn test_cpu_percent_basic() {
    assert!((cpu_percent(25, 100, 1) - 25.0).abs() < 1e-9);
    assert!((cpu_percent(50, 100, 4) - 200.0).abs() < 1e-9);
}

#[test]
fn test_cpu_percent_zero_total_is_zero() {
    let percent = cpu_percent(10, 0, 4);
    assert_eq!(percent, 0.0);
    assert!(!percent.is_nan());
}

#[test]
fn test_cpu_percent_is_clamped() {
    assert_eq!(cpu_percent(300, 100, 2), 200.0);
    assert_eq!(cpu_percent(300, 100, 0), 0.0);
    assert_eq!(cpu_percent(0, 100, 8), 0.0);
}

#[test]
fn test_container_cpu_percent() {
    let pair = CpuSnapshotPair {
        previous: crate::models::CpuTimes {
            busy: 1_000,
            total: 10_000,
        },
        current: crate::models::CpuTimes {
            busy: 1_500,
            total: 14_000,
        },
    };

    let percent = container_cpu_percent("app", &pair, 2).unwrap();
    assert!((percent - 25.0).abs() < 1e-9);
}

#[test]
fn test_container_cpu_percent_after_restart() {
    let pair = CpuSnapshotPair {
        previous: crate::models::CpuTimes {
            busy: 9_000,
            total: 10_000,
        },
        current: crate::models::CpuTimes {
            busy: 10,
            total: 11_000,
        },
    };

    let err = container_cpu_percent("app", &pair, 2).unwrap_err();
    assert!(matches!(err, CounterError::Decreased { index: 0, .. }));
}

#[test]
fn test_compute_cpu_usage() {
    let state = seeded(vec![snap("cpu", &[100, 1000], 0), snap("cpu0", &[50, 500], 0)]);

    let (usage, computation) = compute_cpu_usage(
        &state,
        vec![
            snap("cpu", &[400, 2000], 1000),
            snap("cpu0", &[550, 1000], 1000),
        ],
    );

    assert_eq!(usage.len(), 2);
    assert_eq!(usage[0].identity, "cpu");
    assert!((usage[0].utilization - 30.0).abs() < 1e-9);
    assert_eq!(usage[1].identity, "cpu0");
    assert!((usage[1].utilization - 100.0).abs() < 1e-9);
    assert_eq!(computation.state.len(), 2);
}

#[test]
fn test_compute_cpu_usage_idle_interval() {
    let state = seeded(vec![snap("cpu", &[100, 1000], 0)]);

    let (usage, _) = compute_cpu_usage(&state, vec![snap("cpu", &[100, 1000], 1000)]);

    assert_eq!(usage[0].utilization, 0.0);
}
