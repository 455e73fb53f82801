use std::sync::mpsc;

use checker_core::{ResultEvent, RunStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A retry or other informational note.
    Info(ResultEvent),
    /// A record reached its terminal outcome.
    Recorded { event: ResultEvent, stats: RunStats },
    /// Every task of the run has settled.
    Finished(RunStats),
}

/// Receives progress as it happens. Emitting must never block the run.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<RunEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: RunEvent) {
        // A consumer that hung up just stops observing.
        let _ = self.tx.send(event);
    }
}

/// Sink for callers that only read the final stats.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl ProgressSink for DiscardSink {
    fn emit(&self, _event: RunEvent) {}
}
