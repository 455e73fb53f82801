use std::sync::Once;
use std::time::Duration;

use checker_core::{
    update, Action, CheckTask, Outcome, ProbeOutcome, RunConfig, Step, TaskMsg, TaskState,
};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(checker_logging::initialize_for_tests);
}

fn config(max_retries: u32) -> RunConfig {
    RunConfig {
        max_retries,
        ..RunConfig::default()
    }
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(7)
}

/// Drives a fresh task up to its first dispatch.
fn dispatched(config: &RunConfig) -> CheckTask {
    let mut rng = rng();
    let (task, step) = update(CheckTask::new(), TaskMsg::Start, false, config, &mut rng);
    assert_eq!(step.action, Action::AcquirePermit);
    let (task, step) = update(task, TaskMsg::Admitted, false, config, &mut rng);
    assert_eq!(step.action, Action::Dispatch { attempt: 1 });
    assert_eq!(task.state(), TaskState::Probing);
    task
}

fn finish_of(step: &Step) -> (Outcome, &str) {
    match &step.action {
        Action::Finish { outcome, message } => (*outcome, message.as_str()),
        other => panic!("expected finish, got {other:?}"),
    }
}

#[test]
fn not_found_is_available() {
    init_logging();
    let config = config(5);
    let task = dispatched(&config);
    let (task, step) = update(
        task,
        TaskMsg::ProbeSettled(ProbeOutcome::NotFound),
        false,
        &config,
        &mut rng(),
    );
    assert_eq!(finish_of(&step).0, Outcome::Available);
    assert_eq!(task.state(), TaskState::Terminal(Outcome::Available));
}

#[test]
fn found_is_active() {
    init_logging();
    let config = config(5);
    let task = dispatched(&config);
    let (task, step) = update(
        task,
        TaskMsg::ProbeSettled(ProbeOutcome::Found),
        false,
        &config,
        &mut rng(),
    );
    assert_eq!(finish_of(&step).0, Outcome::Active);
    assert!(task.is_terminal());
}

#[test]
fn cancellation_at_loop_entry_skips_admission() {
    init_logging();
    let config = config(5);
    let (task, step) = update(CheckTask::new(), TaskMsg::Start, true, &config, &mut rng());
    assert_eq!(finish_of(&step).0, Outcome::Cancelled);
    assert_eq!(task.state(), TaskState::Terminal(Outcome::Cancelled));
}

#[test]
fn cancellation_observed_after_admission_prevents_dispatch() {
    init_logging();
    let config = config(5);
    let mut rng = rng();
    let (task, _) = update(CheckTask::new(), TaskMsg::Start, false, &config, &mut rng);
    let (_task, step) = update(task, TaskMsg::Admitted, true, &config, &mut rng);
    assert_eq!(finish_of(&step), (Outcome::Cancelled, "cancelled after admission"));
}

#[test]
fn drained_gate_cancels_waiting_task() {
    init_logging();
    let config = config(5);
    let mut rng = rng();
    let (task, _) = update(CheckTask::new(), TaskMsg::Start, false, &config, &mut rng);
    let (_task, step) = update(task, TaskMsg::Drained, true, &config, &mut rng);
    assert_eq!(finish_of(&step).0, Outcome::Cancelled);
}

#[test]
fn rate_limited_twice_then_found_ends_active_after_two_retries() {
    init_logging();
    let config = config(5);
    let mut rng = rng();
    let mut task = dispatched(&config);
    let mut previous = Duration::ZERO;

    for expected_attempt in 1..=2 {
        let (next, step) = update(
            task,
            TaskMsg::ProbeSettled(ProbeOutcome::RateLimited),
            false,
            &config,
            &mut rng,
        );
        let Action::Sleep(delay) = step.action else {
            panic!("expected backoff, got {:?}", step.action);
        };
        assert_eq!(step.notes.len(), 1);
        assert!(step.notes[0].starts_with("rate limited"));
        assert!(delay >= previous);
        assert!(delay <= config.backoff.max_delay);
        previous = delay;
        assert_eq!(next.attempt(), expected_attempt);
        assert_eq!(next.state(), TaskState::BackoffWait);

        let (next, step) = update(next, TaskMsg::BackoffElapsed, false, &config, &mut rng);
        assert_eq!(step.action, Action::AcquirePermit);
        let (next, step) = update(next, TaskMsg::Admitted, false, &config, &mut rng);
        assert_eq!(
            step.action,
            Action::Dispatch {
                attempt: expected_attempt + 1
            }
        );
        task = next;
    }

    let (task, step) = update(
        task,
        TaskMsg::ProbeSettled(ProbeOutcome::Found),
        false,
        &config,
        &mut rng,
    );
    assert_eq!(finish_of(&step).0, Outcome::Active);
    assert_eq!(task.attempt(), 2);
}

#[test]
fn transient_failures_exhaust_retry_budget() {
    init_logging();
    let config = config(2);
    let mut rng = rng();
    let task = dispatched(&config);
    let timeout = || TaskMsg::ProbeSettled(ProbeOutcome::TransientFailure("timed out".into()));

    let (task, step) = update(task, timeout(), false, &config, &mut rng);
    assert!(matches!(step.action, Action::Sleep(_)));
    let (task, _) = update(task, TaskMsg::BackoffElapsed, false, &config, &mut rng);
    let (task, _) = update(task, TaskMsg::Admitted, false, &config, &mut rng);
    let (task, step) = update(task, timeout(), false, &config, &mut rng);

    let (outcome, message) = finish_of(&step);
    assert_eq!(outcome, Outcome::Error);
    assert!(message.starts_with("max retries exceeded"));
    assert_eq!(task.attempt(), 2);
}

#[test]
fn transient_retry_without_jitter_uses_exact_growth() {
    init_logging();
    let mut config = config(5);
    config.backoff.initial_delay = Duration::from_millis(100);
    let mut rng = rng();
    let task = dispatched(&config);
    let failure = || TaskMsg::ProbeSettled(ProbeOutcome::TransientFailure("http 503".into()));

    assert_eq!(task.delay(), Duration::ZERO);
    let (task, step) = update(task, failure(), false, &config, &mut rng);
    assert_eq!(step.action, Action::Sleep(Duration::from_millis(100)));
    assert_eq!(task.delay(), Duration::from_millis(100));
    let (task, _) = update(task, TaskMsg::BackoffElapsed, false, &config, &mut rng);
    let (task, _) = update(task, TaskMsg::Admitted, false, &config, &mut rng);
    let (task, step) = update(task, failure(), false, &config, &mut rng);
    assert_eq!(step.action, Action::Sleep(Duration::from_millis(200)));
    assert_eq!(task.delay(), Duration::from_millis(200));
}

#[test]
fn cancellation_before_backoff_sleep_is_cancelled() {
    init_logging();
    let config = config(5);
    let task = dispatched(&config);
    let (_task, step) = update(
        task,
        TaskMsg::ProbeSettled(ProbeOutcome::RateLimited),
        true,
        &config,
        &mut rng(),
    );
    assert_eq!(finish_of(&step).0, Outcome::Cancelled);
}

#[test]
fn settled_probe_is_recorded_even_when_cancelled() {
    init_logging();
    let config = config(5);
    let task = dispatched(&config);
    let (_task, step) = update(
        task,
        TaskMsg::ProbeSettled(ProbeOutcome::Found),
        true,
        &config,
        &mut rng(),
    );
    assert_eq!(finish_of(&step).0, Outcome::Active);
}

#[test]
fn malformed_body_policy_is_configurable() {
    init_logging();
    let malformed = || TaskMsg::ProbeSettled(ProbeOutcome::Malformed("expected value".into()));

    let strict = config(5);
    let (_task, step) = update(dispatched(&strict), malformed(), false, &strict, &mut rng());
    assert_eq!(finish_of(&step).0, Outcome::Error);

    let lenient = RunConfig {
        retry_malformed: true,
        ..config(5)
    };
    let (task, step) = update(dispatched(&lenient), malformed(), false, &lenient, &mut rng());
    assert!(matches!(step.action, Action::Sleep(_)));
    assert_eq!(task.attempt(), 1);
}

#[test]
fn fatal_failure_is_not_retried() {
    init_logging();
    let config = config(5);
    let (task, step) = update(
        dispatched(&config),
        TaskMsg::ProbeSettled(ProbeOutcome::FatalFailure("invalid endpoint".into())),
        false,
        &config,
        &mut rng(),
    );
    assert_eq!(finish_of(&step), (Outcome::Error, "invalid endpoint"));
    assert_eq!(task.attempt(), 0);
}

#[test]
fn out_of_order_message_fails_the_task() {
    init_logging();
    let config = config(5);
    let (task, step) = update(
        CheckTask::new(),
        TaskMsg::ProbeSettled(ProbeOutcome::Found),
        false,
        &config,
        &mut rng(),
    );
    assert_eq!(finish_of(&step).0, Outcome::Error);
    assert!(task.is_terminal());
}

#[test]
fn terminal_task_keeps_its_outcome() {
    init_logging();
    let config = config(5);
    let (task, _) = update(CheckTask::new(), TaskMsg::Start, true, &config, &mut rng());
    let (task, step) = update(task, TaskMsg::Admitted, false, &config, &mut rng());
    assert_eq!(finish_of(&step).0, Outcome::Cancelled);
    assert_eq!(task.state(), TaskState::Terminal(Outcome::Cancelled));
}
