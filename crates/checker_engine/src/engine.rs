use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread;

use checker_core::{InputError, InputRecord, ResultAggregator, RunConfig, RunSnapshot, RunStats};
use checker_logging::checker_info;

use crate::events::ChannelProgressSink;
use crate::export::{export_found, export_results, ExportError, ExportSummary};
use crate::{BatchRunner, CancelToken, Probe, RunError, RunEvent};

/// Caller-side control surface of one run.
///
/// The run executes on its own thread with its own tokio runtime, so the
/// handle can be driven from synchronous code.
pub struct RunHandle {
    cancel: CancelToken,
    aggregator: Arc<ResultAggregator>,
    event_rx: mpsc::Receiver<RunEvent>,
    worker: thread::JoinHandle<Result<RunStats, RunError>>,
}

impl RunHandle {
    /// Validates the inputs and starts checking `records` in the background.
    pub fn start(
        records: Vec<InputRecord>,
        probe: Arc<dyn Probe>,
        config: RunConfig,
    ) -> Result<Self, RunError> {
        if records.is_empty() {
            return Err(InputError::NoUsableRecords.into());
        }
        config.validate()?;

        let aggregator = Arc::new(ResultAggregator::new(config.results_cap, config.info_cap));
        aggregator.reset(records.len());
        let (event_tx, event_rx) = mpsc::channel();
        let sink = Arc::new(ChannelProgressSink::new(event_tx));
        let runner = BatchRunner::new(config, aggregator.clone(), sink);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("checker-worker")
            .build()
            .map_err(|err| RunError::Runtime(err.to_string()))?;

        let cancel = CancelToken::new();
        let token = cancel.clone();
        let worker = thread::Builder::new()
            .name("checker-run".to_string())
            .spawn(move || runtime.block_on(runner.run(records, probe, token)))
            .map_err(|err| RunError::Runtime(err.to_string()))?;

        Ok(Self {
            cancel,
            aggregator,
            event_rx,
            worker,
        })
    }

    /// Requests cooperative cancellation. Later calls are no-ops.
    pub fn cancel(&self) {
        if self.cancel.signal() {
            checker_info!("Cancellation requested");
        }
    }

    /// A clone of the run's token, e.g. for a signal handler thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.aggregator.snapshot()
    }

    pub fn try_recv(&self) -> Option<RunEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Writes the found-set gathered so far; callable during or after the run.
    pub fn download_found(&self, path: &Path) -> Result<ExportSummary, ExportError> {
        export_found(path, &self.aggregator.found())
    }

    pub fn download_results(&self, path: &Path) -> Result<ExportSummary, ExportError> {
        export_results(path, &self.aggregator.snapshot().results)
    }

    /// Blocks until the run has settled and returns its final stats.
    pub fn wait(self) -> Result<RunStats, RunError> {
        self.worker
            .join()
            .map_err(|_| RunError::TaskFailed("run thread panicked".to_string()))?
    }
}
