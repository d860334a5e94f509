//! Backoff behaviour on a paused tokio clock

use encore_network::{BackoffCategory, BackoffConfig, BackoffController};
use proptest::prelude::*;
use std::time::Duration;

fn controller(base_ms: u64, max_ms: u64) -> BackoffController {
    BackoffController::new(
        BackoffCategory::PlaybackSync,
        BackoffConfig::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms)),
    )
}

#[tokio::test(start_paused = true)]
async fn test_five_failures_produce_doubling_thresholds() {
    let backoff = controller(5000, 120_000);
    let mut thresholds = Vec::new();

    for _ in 0..5 {
        backoff.record_failure();
        thresholds.push(backoff.current_threshold().as_millis());
    }
    assert_eq!(thresholds, vec![5000, 10000, 20000, 40000, 80000]);

    backoff.record_failure();
    assert_eq!(backoff.current_threshold(), Duration::from_millis(120_000));
}

#[tokio::test(start_paused = true)]
async fn test_gate_closed_until_unjittered_threshold_elapses() {
    let backoff = controller(5000, 120_000);
    assert!(backoff.should_attempt());

    backoff.record_failure();
    assert!(!backoff.should_attempt());

    tokio::time::advance(Duration::from_millis(4999)).await;
    assert!(!backoff.should_attempt());
    assert_eq!(backoff.remaining(), Duration::from_millis(1));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(backoff.should_attempt());

    // Second failure doubles the wait
    backoff.record_failure();
    tokio::time::advance(Duration::from_millis(9999)).await;
    assert!(!backoff.should_attempt());
    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(backoff.should_attempt());
}

#[tokio::test(start_paused = true)]
async fn test_single_success_resets() {
    let backoff = controller(5000, 120_000);
    for _ in 0..4 {
        backoff.record_failure();
    }
    assert_eq!(backoff.failure_count(), 4);

    backoff.record_success();

    assert_eq!(backoff.failure_count(), 0);
    assert!(backoff.should_attempt());
    assert_eq!(backoff.current_threshold(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_without_jitter_returns_exact_delay() {
    let backoff = BackoffController::new(
        BackoffCategory::Downloads,
        BackoffCategory::Downloads.default_config().without_jitter(),
    );

    let delays: Vec<u64> = (0..3).map(|_| backoff.record_failure().as_secs()).collect();
    assert_eq!(delays, vec![3, 6, 12]);
}

proptest! {
    /// Property: unjittered delays never decrease and never exceed the cap
    #[test]
    fn thresholds_are_monotonic_and_capped(
        base_ms in 1u64..10_000,
        cap_factor in 1u64..200,
        failures in 1u32..64,
    ) {
        let config = BackoffConfig::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(base_ms * cap_factor),
        );

        let mut previous = Duration::ZERO;
        for n in 1..=failures {
            let delay = config.delay_for(n);
            prop_assert!(delay >= previous, "delay decreased at failure {}", n);
            prop_assert!(delay <= config.max_delay);
            previous = delay;
        }
    }

    /// Property: returned delays stay between the raw delay and raw + 30%
    #[test]
    fn jittered_delays_are_bounded(failures in 1usize..20) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let backoff = BackoffController::for_category(BackoffCategory::Prefetch);
            for n in 1..=failures {
                let delay = backoff.record_failure();
                let raw = backoff.config().delay_for(n as u32);
                assert!(delay >= raw);
                assert!(delay <= raw.mul_f64(1.3) + Duration::from_nanos(1));
                assert!(!backoff.should_attempt());
            }
        });
    }
}
