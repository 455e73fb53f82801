use std::fmt;

use chrono::{DateTime, Utc};

/// What a probe learned about one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found,
    NotFound,
    RateLimited,
    /// The remote answered with success but the body could not be parsed.
    Malformed(String),
    TransientFailure(String),
    FatalFailure(String),
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Found => write!(f, "found"),
            ProbeOutcome::NotFound => write!(f, "not found"),
            ProbeOutcome::RateLimited => write!(f, "rate limited"),
            ProbeOutcome::Malformed(detail) => write!(f, "malformed response: {detail}"),
            ProbeOutcome::TransientFailure(detail) => write!(f, "transient failure: {detail}"),
            ProbeOutcome::FatalFailure(detail) => write!(f, "fatal failure: {detail}"),
        }
    }
}

/// Terminal classification of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Active,
    Available,
    Error,
    Cancelled,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Active => "active",
            Outcome::Available => "available",
            Outcome::Error => "error",
            Outcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Terminal(Outcome),
    Info,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Terminal(outcome) => outcome.fmt(f),
            EventStatus::Info => f.write_str("info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEvent {
    pub status: EventStatus,
    pub key: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ResultEvent {
    pub fn new(status: EventStatus, key: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            key,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub total: usize,
    pub processed: usize,
    pub active: usize,
    pub available: usize,
    pub error: usize,
    pub cancelled: usize,
}

impl RunStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// True once every record has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.processed + self.cancelled >= self.total
    }

    pub(crate) fn count(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Active => self.active += 1,
            Outcome::Available => self.available += 1,
            Outcome::Error => self.error += 1,
            Outcome::Cancelled => {
                self.cancelled += 1;
                return;
            }
        }
        self.processed += 1;
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} processed (active {}, available {}, error {}, cancelled {})",
            self.processed, self.total, self.active, self.available, self.error, self.cancelled
        )
    }
}
