use std::sync::Arc;

use checker_core::{ConfigError, InputError, InputRecord, ResultAggregator, RunConfig, RunStats};
use checker_logging::{checker_error, checker_info};
use tokio::task::JoinSet;

use crate::cancel::drain_on_cancel;
use crate::check::{drive_check, RunContext};
use crate::{AdmissionGate, CancelToken, Probe, ProgressSink, RunEvent};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("invalid run configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("check task failed: {0}")]
    TaskFailed(String),
    #[error("failed to start run: {0}")]
    Runtime(String),
}

/// Fans a batch of records out to check tasks and joins them.
///
/// The runner never retries or classifies anything itself.
pub struct BatchRunner {
    config: RunConfig,
    aggregator: Arc<ResultAggregator>,
    sink: Arc<dyn ProgressSink>,
}

impl BatchRunner {
    pub fn new(
        config: RunConfig,
        aggregator: Arc<ResultAggregator>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            config,
            aggregator,
            sink,
        }
    }

    pub fn aggregator(&self) -> &Arc<ResultAggregator> {
        &self.aggregator
    }

    /// Checks every record and returns once each one is terminal.
    ///
    /// Outcomes recorded before a task failure stay in the aggregator even
    /// when this returns an error.
    pub async fn run(
        &self,
        records: Vec<InputRecord>,
        probe: Arc<dyn Probe>,
        cancel: CancelToken,
    ) -> Result<RunStats, RunError> {
        if records.is_empty() {
            return Err(InputError::NoUsableRecords.into());
        }
        self.config.validate()?;

        let total = records.len();
        self.aggregator.reset(total);
        let gate = Arc::new(AdmissionGate::new(self.config.concurrency));
        let watcher = drain_on_cancel(cancel.clone(), gate.clone());
        let ctx = Arc::new(RunContext {
            config: self.config.clone(),
            gate,
            cancel,
            probe,
            aggregator: self.aggregator.clone(),
            sink: self.sink.clone(),
        });

        checker_info!(
            "Starting run: {} record(s), concurrency {}, max retries {}",
            total,
            self.config.concurrency,
            self.config.max_retries
        );

        let mut tasks = JoinSet::new();
        for record in records {
            tasks.spawn(drive_check(ctx.clone(), Arc::new(record)));
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                checker_error!("Check task failed: {}", err);
                failure.get_or_insert_with(|| RunError::TaskFailed(err.to_string()));
            }
        }
        watcher.abort();

        let stats = self.aggregator.stats();
        checker_info!("Run finished: {}", stats);
        self.sink.emit(RunEvent::Finished(stats));
        match failure {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }
}
