use std::time::Duration;

use rand::Rng;

use crate::{Outcome, ProbeOutcome, RunConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    /// Admitted through the gate with a probe in flight.
    Probing,
    BackoffWait,
    Terminal(Outcome),
}

/// Input to the task state machine, produced by whoever drives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskMsg {
    /// Loop entry for the first attempt.
    Start,
    /// The admission gate granted a permit.
    Admitted,
    /// The admission gate was drained by cancellation; no permit is held.
    Drained,
    ProbeSettled(ProbeOutcome),
    BackoffElapsed,
}

/// The single thing the driver must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AcquirePermit,
    /// Run the probe; `attempt` is 1-based.
    Dispatch { attempt: u32 },
    Sleep(Duration),
    Finish { outcome: Outcome, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Informational notes to log before performing the action.
    pub notes: Vec<String>,
    pub action: Action,
}

impl Step {
    fn act(action: Action) -> Self {
        Self {
            notes: Vec::new(),
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckTask {
    state: TaskState,
    attempt: u32,
    delay: Duration,
}

impl Default for CheckTask {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckTask {
    pub fn new() -> Self {
        Self {
            state: TaskState::Pending,
            attempt: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Number of failed attempts that counted towards the retry budget.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Most recent backoff delay, zero before the first retry.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TaskState::Terminal(_))
    }

    fn finish(mut self, outcome: Outcome, message: impl Into<String>) -> (Self, Step) {
        self.state = TaskState::Terminal(outcome);
        let step = Step::act(Action::Finish {
            outcome,
            message: message.into(),
        });
        (self, step)
    }
}

/// Pure transition function: applies one message and returns the next step.
///
/// `cancelled` is the cancellation flag as observed by the driver right
/// before the call. It is only consulted at loop entry, right after
/// admission, and before a backoff sleep; a settled probe is always
/// classified.
pub fn update<R: Rng + ?Sized>(
    task: CheckTask,
    msg: TaskMsg,
    cancelled: bool,
    config: &RunConfig,
    rng: &mut R,
) -> (CheckTask, Step) {
    match (task.state, msg) {
        (TaskState::Terminal(outcome), _) => task.finish(outcome, "already finished"),
        (TaskState::Pending, TaskMsg::Start) | (TaskState::BackoffWait, TaskMsg::BackoffElapsed) => {
            if cancelled {
                return task.finish(Outcome::Cancelled, "cancelled before probe");
            }
            let mut task = task;
            task.state = TaskState::Pending;
            (task, Step::act(Action::AcquirePermit))
        }
        (TaskState::Pending, TaskMsg::Admitted) => {
            if cancelled {
                return task.finish(Outcome::Cancelled, "cancelled after admission");
            }
            let mut task = task;
            let attempt = task.attempt + 1;
            task.state = TaskState::Probing;
            (task, Step::act(Action::Dispatch { attempt }))
        }
        (TaskState::Pending, TaskMsg::Drained) => {
            task.finish(Outcome::Cancelled, "cancelled while waiting for admission")
        }
        (TaskState::Probing, TaskMsg::ProbeSettled(outcome)) => {
            classify(task, outcome, cancelled, config, rng)
        }
        (state, msg) => task.finish(
            Outcome::Error,
            format!("unexpected {msg:?} while {state:?}"),
        ),
    }
}

fn classify<R: Rng + ?Sized>(
    task: CheckTask,
    outcome: ProbeOutcome,
    cancelled: bool,
    config: &RunConfig,
    rng: &mut R,
) -> (CheckTask, Step) {
    match outcome {
        ProbeOutcome::Found => task.finish(Outcome::Active, "account exists"),
        ProbeOutcome::NotFound => task.finish(Outcome::Available, "account not found"),
        ProbeOutcome::FatalFailure(detail) => task.finish(Outcome::Error, detail),
        ProbeOutcome::Malformed(detail) if !config.retry_malformed => {
            task.finish(Outcome::Error, format!("unparsable response: {detail}"))
        }
        ProbeOutcome::RateLimited => {
            retry(task, "rate limited".to_string(), true, cancelled, config, rng)
        }
        other => {
            let jitter = config.jitter_transient;
            retry(task, other.to_string(), jitter, cancelled, config, rng)
        }
    }
}

fn retry<R: Rng + ?Sized>(
    mut task: CheckTask,
    reason: String,
    jitter: bool,
    cancelled: bool,
    config: &RunConfig,
    rng: &mut R,
) -> (CheckTask, Step) {
    task.attempt += 1;
    if task.attempt >= config.max_retries {
        let message = format!(
            "max retries exceeded after {} attempts: {reason}",
            task.attempt
        );
        return task.finish(Outcome::Error, message);
    }
    if cancelled {
        return task.finish(Outcome::Cancelled, format!("cancelled before retry: {reason}"));
    }

    let policy = &config.backoff;
    let jitter = if jitter {
        policy.sample_jitter(rng)
    } else {
        Duration::ZERO
    };
    let delay = policy.next_delay(task.attempt, task.delay, jitter);
    task.delay = delay;
    task.state = TaskState::BackoffWait;

    let note = format!(
        "{reason}; retry {}/{} in {} ms",
        task.attempt,
        config.max_retries - 1,
        delay.as_millis()
    );
    let step = Step {
        notes: vec![note],
        action: Action::Sleep(delay),
    };
    (task, step)
}
