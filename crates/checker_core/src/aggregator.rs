use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{EventStatus, InputRecord, Outcome, Payload, ResultEvent, RunStats};

/// Point-in-time copy of everything a progress observer renders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSnapshot {
    pub stats: RunStats,
    /// Terminal events, most recent first.
    pub results: Vec<ResultEvent>,
    /// Retry and other informational events, most recent first.
    pub info: Vec<ResultEvent>,
    pub found_count: usize,
}

#[derive(Debug, Default)]
struct AggregatorState {
    stats: RunStats,
    results: VecDeque<ResultEvent>,
    info: VecDeque<ResultEvent>,
    found: Vec<Payload>,
}

/// Serialized sink for task outcomes.
///
/// Every mutation happens under one lock, so a counter increment is never
/// interleaved with a log trim from another task.
#[derive(Debug)]
pub struct ResultAggregator {
    results_cap: usize,
    info_cap: usize,
    state: Mutex<AggregatorState>,
}

impl ResultAggregator {
    pub fn new(results_cap: usize, info_cap: usize) -> Self {
        Self {
            results_cap: results_cap.max(1),
            info_cap: info_cap.max(1),
            state: Mutex::new(AggregatorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Zeroes the counters and clears both logs and the found-set.
    pub fn reset(&self, total: usize) {
        let mut state = self.lock();
        *state = AggregatorState {
            stats: RunStats::new(total),
            ..AggregatorState::default()
        };
    }

    /// Records the terminal outcome of `record` and returns the updated stats.
    pub fn record_terminal(
        &self,
        outcome: Outcome,
        message: impl Into<String>,
        record: &InputRecord,
    ) -> (ResultEvent, RunStats) {
        self.record_terminal_with(outcome, message, record, |_, _| {})
    }

    /// Like [`ResultAggregator::record_terminal`], but hands the event and
    /// stats to `notify` before the lock is released.
    ///
    /// Observers notified this way see `processed` in counting order.
    /// `notify` must not block or call back into the aggregator.
    pub fn record_terminal_with<F>(
        &self,
        outcome: Outcome,
        message: impl Into<String>,
        record: &InputRecord,
        notify: F,
    ) -> (ResultEvent, RunStats)
    where
        F: FnOnce(&ResultEvent, RunStats),
    {
        let event = ResultEvent::new(
            EventStatus::Terminal(outcome),
            Some(record.key().to_string()),
            message,
        );
        let mut state = self.lock();
        state.stats.count(outcome);
        if outcome == Outcome::Active {
            state.found.push(record.payload().clone());
        }
        state.results.push_front(event.clone());
        state.results.truncate(self.results_cap);
        notify(&event, state.stats);
        (event, state.stats)
    }

    pub fn record_info(&self, key: Option<&str>, message: impl Into<String>) -> ResultEvent {
        let event = ResultEvent::new(EventStatus::Info, key.map(str::to_string), message);
        let mut state = self.lock();
        state.info.push_front(event.clone());
        state.info.truncate(self.info_cap);
        event
    }

    pub fn stats(&self) -> RunStats {
        self.lock().stats
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let state = self.lock();
        RunSnapshot {
            stats: state.stats,
            results: state.results.iter().cloned().collect(),
            info: state.info.iter().cloned().collect(),
            found_count: state.found.len(),
        }
    }

    /// Payloads of every record classified active, in completion order.
    pub fn found(&self) -> Vec<Payload> {
        self.lock().found.clone()
    }
}
