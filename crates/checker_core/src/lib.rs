//! Checker core: domain types, retry state machine and result aggregation.
mod aggregator;
mod backoff;
mod config;
mod input;
mod outcome;
mod record;
mod task;

pub use aggregator::{ResultAggregator, RunSnapshot};
pub use backoff::BackoffPolicy;
pub use config::{
    duration_ms, ConfigError, RunConfig, DEFAULT_CONCURRENCY, DEFAULT_INFO_CAP,
    DEFAULT_MAX_RETRIES, DEFAULT_RESULTS_CAP,
};
pub use input::{normalize_key, resolve_records, InputError};
pub use outcome::{EventStatus, Outcome, ProbeOutcome, ResultEvent, RunStats};
pub use record::{InputRecord, Payload, SharedRecord};
pub use task::{update, Action, CheckTask, Step, TaskMsg, TaskState};
