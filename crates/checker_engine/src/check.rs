use std::sync::Arc;

use checker_core::{
    update, Action, CheckTask, Outcome, ProbeOutcome, ResultAggregator, RunConfig, SharedRecord,
    TaskMsg,
};
use checker_logging::{checker_debug, checker_trace, checker_warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::gate::{Admission, AdmissionGate};
use crate::{CancelToken, Probe, ProgressSink, RunEvent};

/// Everything the tasks of one run share.
pub(crate) struct RunContext {
    pub config: RunConfig,
    pub gate: Arc<AdmissionGate>,
    pub cancel: CancelToken,
    pub probe: Arc<dyn Probe>,
    pub aggregator: Arc<ResultAggregator>,
    pub sink: Arc<dyn ProgressSink>,
}

/// Drives one record through the check state machine until it is terminal.
///
/// The permit is held only while a probe is in flight; it is dropped as soon
/// as the probe settles, and on every other exit path by its guard.
pub(crate) async fn drive_check(ctx: Arc<RunContext>, record: SharedRecord) -> Outcome {
    let mut rng = StdRng::from_entropy();
    let mut task = CheckTask::new();
    let mut msg = TaskMsg::Start;
    let mut permit = None;

    loop {
        let cancelled = ctx.cancel.is_signalled();
        let (next, step) = update(task, msg, cancelled, &ctx.config, &mut rng);
        task = next;

        for note in step.notes {
            checker_debug!("{}: {}", record.key(), note);
            let event = ctx.aggregator.record_info(Some(record.key()), note);
            ctx.sink.emit(RunEvent::Info(event));
        }

        msg = match step.action {
            Action::AcquirePermit => match ctx.gate.acquire().await {
                Admission::Granted(granted) => {
                    permit = Some(granted);
                    TaskMsg::Admitted
                }
                Admission::Drained => TaskMsg::Drained,
            },
            Action::Dispatch { attempt } => {
                checker_trace!("{}: dispatching probe attempt {}", record.key(), attempt);
                let outcome = probe_once(&ctx, record.key()).await;
                drop(permit.take());
                TaskMsg::ProbeSettled(outcome)
            }
            Action::Sleep(delay) => {
                // Cancellation cuts the wait short; the flag is re-read at loop entry.
                let _ = tokio::time::timeout(delay, ctx.cancel.cancelled()).await;
                TaskMsg::BackoffElapsed
            }
            Action::Finish { outcome, message } => {
                drop(permit.take());
                if outcome == Outcome::Error {
                    checker_warn!("{}: {}", record.key(), message);
                }
                ctx.aggregator
                    .record_terminal_with(outcome, message, &record, |event, stats| {
                        ctx.sink.emit(RunEvent::Recorded {
                            event: event.clone(),
                            stats,
                        });
                    });
                return outcome;
            }
        };
    }
}

async fn probe_once(ctx: &RunContext, key: &str) -> ProbeOutcome {
    let limit = ctx.config.probe_timeout;
    match tokio::time::timeout(limit, ctx.probe.check(key)).await {
        Ok(outcome) => outcome,
        Err(_) => ProbeOutcome::TransientFailure(format!("timed out after {} ms", limit.as_millis())),
    }
}
