use std::time::Duration;

use checker_core::BackoffPolicy;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn policy() -> BackoffPolicy {
    BackoffPolicy {
        initial_delay: Duration::from_millis(1_000),
        growth_factor: 2.0,
        max_delay: Duration::from_secs(30),
        max_jitter: Duration::from_millis(1_000),
    }
}

#[test]
fn first_retry_uses_initial_delay() {
    let delay = policy().next_delay(1, Duration::ZERO, Duration::ZERO);
    assert_eq!(delay, Duration::from_millis(1_000));
}

#[test]
fn later_retries_grow_by_factor() {
    let policy = policy();
    let second = policy.next_delay(2, Duration::from_millis(1_000), Duration::ZERO);
    let third = policy.next_delay(3, second, Duration::from_millis(250));
    assert_eq!(second, Duration::from_millis(2_000));
    assert_eq!(third, Duration::from_millis(4_250));
}

#[test]
fn delay_is_non_decreasing_and_capped() {
    let policy = policy();
    let mut rng = StdRng::seed_from_u64(42);
    let mut previous = Duration::ZERO;
    for attempt in 1..=20 {
        let jitter = policy.sample_jitter(&mut rng);
        let next = policy.next_delay(attempt, previous, jitter);
        assert!(next >= previous, "attempt {attempt}: {next:?} < {previous:?}");
        assert!(next <= policy.max_delay, "attempt {attempt}: {next:?} over cap");
        previous = next;
    }
    assert_eq!(previous, policy.max_delay);
}

#[test]
fn jitter_stays_within_bounds() {
    let policy = policy();
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..200 {
        assert!(policy.sample_jitter(&mut rng) <= policy.max_jitter);
    }
}

#[test]
fn zero_jitter_bound_never_jitters() {
    let policy = BackoffPolicy {
        max_jitter: Duration::ZERO,
        ..policy()
    };
    let mut rng = StdRng::seed_from_u64(3);
    assert_eq!(policy.sample_jitter(&mut rng), Duration::ZERO);
}

#[test]
fn huge_previous_delay_saturates_at_cap() {
    let delay = policy().next_delay(9, Duration::from_secs(u32::MAX as u64), Duration::ZERO);
    assert_eq!(delay, Duration::from_secs(30));
}
